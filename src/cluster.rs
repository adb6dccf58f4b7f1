//! In-Process Cluster
//!
//! Several members in one runtime, wired through a `LocalTransport` and sharing
//! one router and one listener registry. The partition table is a static
//! round-robin assignment published once at start.

use crate::config::{ClusterConfig, MAX_BACKUP_COUNT};
use crate::container::listener::ListenerRegistry;
use crate::engine::node::Node;
use crate::invocation::transport::{LocalTransport, Transport};
use crate::membership::types::MemberId;
use crate::operation::types::{Data, QueueItem};
use crate::partition::router::PartitionRouter;
use crate::partition::table::PartitionTable;
use crate::proxy::queue::QueueProxy;

use anyhow::Result;
use std::sync::Arc;

pub struct LocalCluster {
    router: Arc<PartitionRouter>,
    transport: Arc<LocalTransport>,
    listeners: Arc<ListenerRegistry>,
    nodes: Vec<Arc<Node>>,
}

impl LocalCluster {
    /// Starts `member_count` members named `member-0`, `member-1`, ...
    pub fn start(member_count: usize, config: ClusterConfig) -> Result<Self> {
        if member_count == 0 {
            return Err(anyhow::anyhow!("a cluster needs at least one member"));
        }
        config.validate()?;
        let config = Arc::new(config);

        let members: Vec<MemberId> = (0..member_count)
            .map(|index| MemberId(format!("member-{}", index)))
            .collect();

        let router = Arc::new(PartitionRouter::new(config.partition_count));
        router.publish(PartitionTable::round_robin(
            1,
            config.partition_count,
            &members,
            MAX_BACKUP_COUNT,
        ))?;

        let transport = LocalTransport::new();
        let listeners = ListenerRegistry::new();
        let nodes = members
            .into_iter()
            .map(|member_id| {
                let node = Node::start(
                    member_id,
                    router.clone(),
                    config.clone(),
                    transport.clone() as Arc<dyn Transport>,
                    listeners.clone(),
                );
                transport.register(&node);
                node
            })
            .collect();

        tracing::info!("Local cluster started with {} members", member_count);

        Ok(Self {
            router,
            transport,
            listeners,
            nodes,
        })
    }

    pub fn nodes(&self) -> &[Arc<Node>] {
        &self.nodes
    }

    pub fn node(&self, member: &MemberId) -> Option<&Arc<Node>> {
        self.nodes.iter().find(|node| node.member_id() == member)
    }

    pub fn router(&self) -> &Arc<PartitionRouter> {
        &self.router
    }

    pub fn transport(&self) -> &Arc<LocalTransport> {
        &self.transport
    }

    pub fn listeners(&self) -> &Arc<ListenerRegistry> {
        &self.listeners
    }

    /// A proxy for `name` invoking through the first member.
    pub fn queue(&self, name: &str) -> QueueProxy {
        self.nodes[0].get_queue(name)
    }

    pub fn owner_of(&self, name: &str) -> Option<MemberId> {
        self.router
            .owner_of(self.router.partition_id_for(name))
    }

    pub fn backups_of(&self, name: &str) -> Vec<MemberId> {
        self.router
            .backups_of(self.router.partition_id_for(name))
    }

    /// `member`'s copy of queue `name`; empty for unknown members.
    pub async fn container_items(&self, member: &MemberId, name: &str) -> Vec<QueueItem> {
        match self.node(member) {
            Some(node) => node.container_items(name).await,
            None => Vec::new(),
        }
    }

    pub async fn container_values(&self, member: &MemberId, name: &str) -> Vec<Data> {
        match self.node(member) {
            Some(node) => node.container_values(name).await,
            None => Vec::new(),
        }
    }
}

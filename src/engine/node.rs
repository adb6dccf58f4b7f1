//! Cluster Member
//!
//! A `Node` is the receiving side of the invocation path. It decodes inbound
//! request packets, checks that it owns the addressed partition, hands the
//! operation to that partition's worker and encodes the outcome. Decoding happens
//! here and only here, so a malformed packet fails its own invocation and nothing
//! else.

use super::replication::ReplicationService;
use super::worker::{
    EventBatch, OperationResult, PartitionCommand, PartitionWorker, WorkerContext,
    run_event_dispatcher,
};
use crate::config::ClusterConfig;
use crate::container::listener::ListenerRegistry;
use crate::error::ApplicationError;
use crate::invocation::invoker::OperationInvoker;
use crate::invocation::protocol::{RequestPacket, ResponsePacket};
use crate::invocation::transport::Transport;
use crate::membership::types::MemberId;
use crate::operation::registry::OperationRegistry;
use crate::operation::types::{Data, QueueItem};
use crate::partition::router::PartitionRouter;
use crate::proxy::queue::QueueProxy;

use bytes::Bytes;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

pub struct Node {
    member_id: MemberId,
    router: Arc<PartitionRouter>,
    registry: Arc<OperationRegistry>,
    context: Arc<WorkerContext>,
    workers: DashMap<u32, mpsc::UnboundedSender<PartitionCommand>>,
    invoker: OperationInvoker,
    listeners: Arc<ListenerRegistry>,
}

impl Node {
    /// Builds the member and starts its event dispatcher. Partition workers are
    /// spawned on first use. Must be called inside a tokio runtime.
    pub fn start(
        member_id: MemberId,
        router: Arc<PartitionRouter>,
        config: Arc<ClusterConfig>,
        transport: Arc<dyn Transport>,
        listeners: Arc<ListenerRegistry>,
    ) -> Arc<Self> {
        let (events, event_rx) = mpsc::unbounded_channel::<EventBatch>();
        tokio::spawn(run_event_dispatcher(
            member_id.clone(),
            listeners.clone(),
            event_rx,
        ));

        let replication =
            ReplicationService::new(member_id.clone(), transport.clone(), config.invocation.clone());
        let context = Arc::new(WorkerContext {
            member_id: member_id.clone(),
            router: router.clone(),
            config: config.clone(),
            replication,
            listeners: listeners.clone(),
            events,
        });
        let invoker = OperationInvoker::new(router.clone(), transport, config.invocation.clone());

        tracing::info!(
            "Member {} started ({} partitions)",
            member_id,
            router.partition_count()
        );

        Arc::new(Self {
            member_id,
            router,
            registry: OperationRegistry::with_queue_operations(),
            context,
            workers: DashMap::new(),
            invoker,
            listeners,
        })
    }

    pub fn member_id(&self) -> &MemberId {
        &self.member_id
    }

    pub fn router(&self) -> &Arc<PartitionRouter> {
        &self.router
    }

    pub fn invoker(&self) -> &OperationInvoker {
        &self.invoker
    }

    pub fn listeners(&self) -> &Arc<ListenerRegistry> {
        &self.listeners
    }

    /// A proxy for queue `name` that invokes through this member.
    pub fn get_queue(&self, name: &str) -> QueueProxy {
        QueueProxy::new(name, self.invoker.clone(), self.listeners.clone())
    }

    /// Decodes one request, runs it and returns the encoded response.
    pub async fn handle_packet(&self, packet: Bytes) -> Bytes {
        let response = match RequestPacket::decode(packet, &self.registry) {
            Ok(request) => self.handle_request(request).await,
            Err(e) => {
                tracing::warn!("Rejecting undecodable packet on {}: {}", self.member_id, e);
                ResponsePacket::DecodeFailure(e.to_string())
            }
        };
        response.encode()
    }

    async fn handle_request(&self, request: RequestPacket) -> ResponsePacket {
        let RequestPacket {
            partition_id,
            backup,
            operation,
        } = request;

        if partition_id >= self.router.partition_count() {
            return ResponsePacket::DecodeFailure(format!(
                "partition {} out of range",
                partition_id
            ));
        }
        if backup != operation.is_backup() {
            return ResponsePacket::DecodeFailure(format!(
                "class {} sent with backup flag {}",
                operation.class_id(),
                backup
            ));
        }

        if !backup {
            let owner = self.router.owner_of(partition_id);
            if owner.as_ref() != Some(&self.member_id) {
                tracing::debug!(
                    "{} is not the owner of partition {} (owner {:?})",
                    self.member_id,
                    partition_id,
                    owner
                );
                return ResponsePacket::WrongTarget {
                    partition_id,
                    owner,
                };
            }
        }

        let (reply, result) = oneshot::channel::<OperationResult>();
        let command = if backup {
            PartitionCommand::Backup { operation, reply }
        } else {
            PartitionCommand::Primary { operation, reply }
        };
        if self.worker_for(partition_id).send(command).is_err() {
            return ResponsePacket::Error(ApplicationError::internal(format!(
                "partition {} worker stopped",
                partition_id
            )));
        }

        match result.await {
            Ok(Ok(response)) => ResponsePacket::Ok(response),
            Ok(Err(e)) => ResponsePacket::Error(e),
            Err(_) => ResponsePacket::Error(ApplicationError::internal(format!(
                "partition {} dropped the operation",
                partition_id
            ))),
        }
    }

    fn worker_for(&self, partition_id: u32) -> mpsc::UnboundedSender<PartitionCommand> {
        self.workers
            .entry(partition_id)
            .or_insert_with(|| PartitionWorker::spawn(partition_id, self.context.clone()))
            .clone()
    }

    /// This member's copy of queue `name`, whether it holds it as owner or backup.
    pub async fn container_items(&self, name: &str) -> Vec<QueueItem> {
        let partition_id = self.router.partition_id_for(name);
        let (reply, items) = oneshot::channel();
        let command = PartitionCommand::Inspect {
            name: name.to_string(),
            reply,
        };
        if self.worker_for(partition_id).send(command).is_err() {
            return Vec::new();
        }
        items.await.unwrap_or_default()
    }

    /// Operations parked in the partition of queue `name` on this member.
    pub async fn parked_operations(&self, name: &str) -> usize {
        let partition_id = self.router.partition_id_for(name);
        let (reply, count) = oneshot::channel();
        if self
            .worker_for(partition_id)
            .send(PartitionCommand::CountParked { reply })
            .is_err()
        {
            return 0;
        }
        count.await.unwrap_or_default()
    }

    pub async fn container_values(&self, name: &str) -> Vec<Data> {
        self.container_items(name)
            .await
            .into_iter()
            .map(|item| item.data)
            .collect()
    }
}

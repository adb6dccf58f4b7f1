use super::queue::QueueContainer;
use crate::config::ClusterConfig;

use std::collections::HashMap;
use std::sync::Arc;

/// The queue containers of one partition, keyed by name.
///
/// Owned by value by the partition's worker; nothing else holds a reference, so
/// there is no locking here.
#[derive(Debug)]
pub struct ContainerRegistry {
    partition_id: u32,
    config: Arc<ClusterConfig>,
    containers: HashMap<String, QueueContainer>,
}

impl ContainerRegistry {
    pub fn new(partition_id: u32, config: Arc<ClusterConfig>) -> Self {
        Self {
            partition_id,
            config,
            containers: HashMap::new(),
        }
    }

    pub fn partition_id(&self) -> u32 {
        self.partition_id
    }

    /// Returns the container for `name`, creating it with its configured settings
    /// on first access.
    pub fn container_for(&mut self, name: &str) -> &mut QueueContainer {
        let config = &self.config;
        let partition_id = self.partition_id;
        self.containers.entry(name.to_string()).or_insert_with(|| {
            tracing::debug!("Creating container {} in partition {}", name, partition_id);
            QueueContainer::new(name, config.find_queue_config(name).clone())
        })
    }

    pub fn get(&self, name: &str) -> Option<&QueueContainer> {
        self.containers.get(name)
    }

    /// Drops the container for `name`. Returns `false` when there was none.
    pub fn remove_container(&mut self, name: &str) -> bool {
        let removed = self.containers.remove(name).is_some();
        if removed {
            tracing::debug!(
                "Removed container {} from partition {}",
                name,
                self.partition_id
            );
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }
}

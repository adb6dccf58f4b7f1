use super::hash::partition_id_for;
use super::table::PartitionTable;
use crate::membership::types::MemberId;

use anyhow::Result;
use std::sync::{Arc, RwLock};

/// Maps names to partitions and partitions to their current replicas.
///
/// The invocation path only reads. Topology changes come from whoever embeds the
/// router and are published as a whole new `PartitionTable`, so a reader sees
/// either the old owner/backup list or the new one, never a mix.
pub struct PartitionRouter {
    partition_count: u32,
    table: RwLock<Arc<PartitionTable>>,
}

impl PartitionRouter {
    pub fn new(partition_count: u32) -> Self {
        Self {
            partition_count,
            table: RwLock::new(Arc::new(PartitionTable::empty(partition_count))),
        }
    }

    pub fn partition_count(&self) -> u32 {
        self.partition_count
    }

    pub fn partition_id_for(&self, name: &str) -> u32 {
        partition_id_for(name, self.partition_count)
    }

    pub fn snapshot(&self) -> Arc<PartitionTable> {
        match self.table.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn owner_of(&self, partition_id: u32) -> Option<MemberId> {
        self.snapshot().owner(partition_id).cloned()
    }

    pub fn backups_of(&self, partition_id: u32) -> Vec<MemberId> {
        self.snapshot().backups(partition_id).to_vec()
    }

    /// Replaces the current table. Tables for a different partition count or
    /// older than the current one are refused.
    pub fn publish(&self, table: PartitionTable) -> Result<()> {
        if table.partition_count() != self.partition_count {
            return Err(anyhow::anyhow!(
                "partition table has {} partitions, router expects {}",
                table.partition_count(),
                self.partition_count
            ));
        }

        let mut guard = match self.table.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if table.version() < guard.version() {
            return Err(anyhow::anyhow!(
                "stale partition table version {} (current {})",
                table.version(),
                guard.version()
            ));
        }

        tracing::info!("Published partition table version {}", table.version());
        *guard = Arc::new(table);
        Ok(())
    }
}

use crate::membership::types::MemberId;

/// Immutable snapshot of partition ownership.
///
/// `replicas[p][0]` is the owner of partition `p`, the rest are its backups in
/// replica-index order. A new topology is a new table with a higher `version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionTable {
    version: u64,
    replicas: Vec<Vec<MemberId>>,
}

impl PartitionTable {
    /// `replicas[p]` lists owner then backups for partition `p`.
    pub fn new(version: u64, replicas: Vec<Vec<MemberId>>) -> Self {
        Self { version, replicas }
    }

    /// A table with no owners, used before the first topology is published.
    pub fn empty(partition_count: u32) -> Self {
        Self::new(0, vec![Vec::new(); partition_count as usize])
    }

    /// Assigns partitions over the sorted member list: the owner of `p` is
    /// `members[p % n]`, its backups are the next members in order.
    pub fn round_robin(
        version: u64,
        partition_count: u32,
        members: &[MemberId],
        backup_count: usize,
    ) -> Self {
        let mut sorted: Vec<MemberId> = members.to_vec();
        sorted.sort();
        sorted.dedup();

        if sorted.is_empty() {
            let mut table = Self::empty(partition_count);
            table.version = version;
            return table;
        }

        let replica_count = (backup_count + 1).min(sorted.len());
        let replicas = (0..partition_count as usize)
            .map(|partition| {
                (0..replica_count)
                    .map(|offset| sorted[(partition + offset) % sorted.len()].clone())
                    .collect()
            })
            .collect();

        Self::new(version, replicas)
    }

    /// Higher versions supersede lower ones.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn partition_count(&self) -> u32 {
        self.replicas.len() as u32
    }

    /// `None` for partitions without an assigned member or ids out of range.
    pub fn owner(&self, partition_id: u32) -> Option<&MemberId> {
        self.replicas
            .get(partition_id as usize)
            .and_then(|replicas| replicas.first())
    }

    /// Backups of `partition_id` in replica-index order; empty when unassigned.
    pub fn backups(&self, partition_id: u32) -> &[MemberId] {
        match self.replicas.get(partition_id as usize) {
            Some(replicas) if !replicas.is_empty() => &replicas[1..],
            _ => &[],
        }
    }

    /// Partitions `member` owns.
    pub fn primary_partitions_of(&self, member: &MemberId) -> Vec<u32> {
        (0..self.partition_count())
            .filter(|&partition| self.owner(partition) == Some(member))
            .collect()
    }

    /// Partitions `member` holds a backup copy of.
    pub fn backup_partitions_of(&self, member: &MemberId) -> Vec<u32> {
        (0..self.partition_count())
            .filter(|&partition| self.backups(partition).contains(member))
            .collect()
    }
}

//! Partition Module Tests
//!
//! ## Test Scopes
//! - **Hashing**: determinism, known MurmurHash3 values, range and spread.
//! - **Table**: round-robin placement of owners and backups.
//! - **Router**: snapshot publication rules.

#[cfg(test)]
mod tests {
    use crate::membership::types::MemberId;
    use crate::partition::hash::{murmur3_x86_32, partition_id_for};
    use crate::partition::router::PartitionRouter;
    use crate::partition::table::PartitionTable;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn members(ids: &[&str]) -> Vec<MemberId> {
        ids.iter().map(|id| MemberId::from(*id)).collect()
    }

    // ============================================================
    // HASHING TESTS
    // ============================================================

    #[test]
    fn test_murmur3_known_values() {
        assert_eq!(murmur3_x86_32(b"", 0), 0);
        assert_eq!(murmur3_x86_32(b"hello", 0), 0x248b_fa47);
    }

    #[test]
    fn test_partition_is_deterministic() {
        let router = PartitionRouter::new(271);

        let p1 = router.partition_id_for("orders");
        let p2 = router.partition_id_for("orders");

        assert_eq!(p1, p2, "The same name should yield the same partition");
        assert_eq!(p1, partition_id_for("orders", 271));
    }

    #[test]
    fn test_equal_name_bytes_map_to_equal_partitions() {
        let owned = String::from("queue-") + "42";
        let literal = "queue-42";

        assert_eq!(partition_id_for(&owned, 271), partition_id_for(literal, 271));
    }

    #[test]
    fn test_partition_is_within_range() {
        for i in 0..1000 {
            let name = format!("queue_{}", i);
            let partition = partition_id_for(&name, 271);
            assert!(partition < 271, "Partition {} should be < 271", partition);
        }
    }

    #[test]
    fn test_partition_distribution() {
        let mut partition_counts = HashMap::new();

        for i in 0..10000 {
            let partition = partition_id_for(&format!("queue_{}", i), 271);
            *partition_counts.entry(partition).or_insert(0) += 1;
        }

        // ~37 names per partition on average
        assert!(
            partition_counts.len() > 250,
            "Should use most partitions, got: {}",
            partition_counts.len()
        );
    }

    // ============================================================
    // TABLE TESTS
    // ============================================================

    #[test]
    fn test_round_robin_assigns_owner_and_backups() {
        let table = PartitionTable::round_robin(1, 6, &members(&["c", "a", "b"]), 1);

        assert_eq!(table.owner(0), Some(&MemberId::from("a")));
        assert_eq!(table.backups(0), &[MemberId::from("b")]);
        assert_eq!(table.owner(2), Some(&MemberId::from("c")));
        assert_eq!(table.backups(2), &[MemberId::from("a")]);
    }

    #[test]
    fn test_round_robin_caps_backups_by_member_count() {
        let table = PartitionTable::round_robin(1, 4, &members(&["a"]), 2);

        // A single member owns everything and has nobody to back it up
        assert_eq!(table.primary_partitions_of(&MemberId::from("a")).len(), 4);
        assert!(table.backups(0).is_empty());
    }

    #[test]
    fn test_every_partition_has_distinct_replicas() {
        let table = PartitionTable::round_robin(1, 271, &members(&["a", "b", "c", "d"]), 2);

        for partition in 0..271 {
            let owner = table.owner(partition).unwrap();
            let backups = table.backups(partition);
            assert_eq!(backups.len(), 2);
            assert!(!backups.contains(owner));
            assert_ne!(backups[0], backups[1]);
        }
    }

    #[test]
    fn test_primary_and_backup_partitions_split_evenly() {
        let ids = members(&["a", "b"]);
        let table = PartitionTable::round_robin(1, 10, &ids, 1);

        assert_eq!(table.primary_partitions_of(&ids[0]), vec![0, 2, 4, 6, 8]);
        assert_eq!(table.backup_partitions_of(&ids[0]), vec![1, 3, 5, 7, 9]);
    }

    // ============================================================
    // ROUTER TESTS
    // ============================================================

    #[test]
    fn test_router_starts_without_owners() {
        let router = PartitionRouter::new(8);

        assert_eq!(router.owner_of(3), None);
        assert!(router.backups_of(3).is_empty());
        assert_eq!(router.snapshot().version(), 0);
    }

    #[test]
    fn test_publish_replaces_snapshot() {
        let router = PartitionRouter::new(8);
        let ids = members(&["a", "b"]);

        router
            .publish(PartitionTable::round_robin(1, 8, &ids, 1))
            .unwrap();

        assert_eq!(router.owner_of(0), Some(ids[0].clone()));
        assert_eq!(router.backups_of(0), vec![ids[1].clone()]);
    }

    #[test]
    fn test_publish_rejects_stale_version_and_wrong_size() {
        let router = PartitionRouter::new(8);
        let ids = members(&["a", "b"]);
        router
            .publish(PartitionTable::round_robin(5, 8, &ids, 1))
            .unwrap();

        assert!(router.publish(PartitionTable::round_robin(4, 8, &ids, 1)).is_err());
        assert!(router.publish(PartitionTable::round_robin(6, 9, &ids, 1)).is_err());
        assert_eq!(router.snapshot().version(), 5);
    }

    #[test]
    fn test_snapshot_held_by_reader_survives_publish() {
        let router = Arc::new(PartitionRouter::new(4));
        router
            .publish(PartitionTable::round_robin(1, 4, &members(&["a"]), 0))
            .unwrap();
        let before = router.snapshot();

        router
            .publish(PartitionTable::round_robin(2, 4, &members(&["b"]), 0))
            .unwrap();

        assert_eq!(before.owner(0), Some(&MemberId::from("a")));
        assert_eq!(router.owner_of(0), Some(MemberId::from("b")));
    }
}

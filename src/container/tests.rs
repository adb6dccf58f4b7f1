//! Container Module Tests
//!
//! ## Test Scopes
//! - **QueueContainer**: FIFO order, capacity, backup idempotence.
//! - **ContainerRegistry**: lazy creation with per-name config, idempotent removal.
//! - **ListenerRegistry**: registration lifecycle, value inclusion, failing listeners.

#[cfg(test)]
mod tests {
    use crate::config::{ClusterConfig, QueueConfig};
    use crate::container::listener::{ItemEvent, ItemEventKind, ListenerRegistry};
    use crate::container::queue::QueueContainer;
    use crate::container::registry::ContainerRegistry;
    use crate::membership::types::MemberId;
    use crate::operation::types::QueueItem;
    use bytes::Bytes;
    use std::collections::BTreeSet;
    use std::sync::{Arc, Mutex};

    fn data(value: &'static str) -> Bytes {
        Bytes::from_static(value.as_bytes())
    }

    // ============================================================
    // QUEUE CONTAINER TESTS
    // ============================================================

    #[test]
    fn test_container_is_fifo() {
        let mut queue = QueueContainer::new("q", QueueConfig::default());
        queue.offer(data("A"));
        queue.offer(data("B"));

        assert_eq!(queue.peek().map(|item| item.data.clone()), Some(data("A")));
        assert_eq!(queue.poll().map(|item| item.data), Some(data("A")));
        assert_eq!(queue.poll().map(|item| item.data), Some(data("B")));
        assert!(queue.poll().is_none());
    }

    #[test]
    fn test_capacity() {
        let mut queue = QueueContainer::new(
            "q",
            QueueConfig {
                max_size: 2,
                ..QueueConfig::default()
            },
        );

        assert!(queue.has_capacity(2));
        queue.offer(data("A"));
        assert!(queue.has_capacity(1));
        assert!(!queue.has_capacity(2));
        queue.offer(data("B"));
        assert!(!queue.has_capacity(1));
    }

    #[test]
    fn test_remove_takes_first_match_only() {
        let mut queue = QueueContainer::new("q", QueueConfig::default());
        queue.add_all(vec![data("A"), data("B"), data("A")]);

        let removed = queue.remove(&data("A")).unwrap();

        assert_eq!(removed.item_id, 1);
        assert_eq!(queue.iterate_all(), vec![data("B"), data("A")]);
    }

    #[test]
    fn test_drain_more_than_size() {
        let mut queue = QueueContainer::new("q", QueueConfig::default());
        queue.add_all(vec![data("A"), data("B")]);

        let drained = queue.drain(Some(10));

        assert_eq!(drained.len(), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_offer_backup_is_idempotent_and_advances_ids() {
        let mut replica = QueueContainer::new("q", QueueConfig::default());

        replica.offer_backup(QueueItem::new(5, data("A")));
        replica.offer_backup(QueueItem::new(5, data("A")));

        assert_eq!(replica.size(), 1);

        // Ids assigned after promotion continue past the replicated ones
        let next = replica.offer(data("B"));
        assert_eq!(next.item_id, 6);
    }

    #[test]
    fn test_remove_all_backup_tolerates_missing_ids() {
        let mut replica = QueueContainer::new("q", QueueConfig::default());
        replica.add_all_backup(vec![QueueItem::new(1, data("A")), QueueItem::new(2, data("B"))]);

        let removed = replica.remove_all_backup(&BTreeSet::from([1, 7]));
        let removed_again = replica.remove_all_backup(&BTreeSet::from([1, 7]));

        assert_eq!(removed, 1);
        assert_eq!(removed_again, 0);
        assert_eq!(replica.items(), vec![QueueItem::new(2, data("B"))]);
        assert!(!replica.remove_backup(1));
    }

    // ============================================================
    // CONTAINER REGISTRY TESTS
    // ============================================================

    #[test]
    fn test_registry_creates_on_first_access_with_config() {
        let config = ClusterConfig::default().with_queue(
            "bounded*",
            QueueConfig {
                max_size: 3,
                ..QueueConfig::default()
            },
        );
        let mut registry = ContainerRegistry::new(4, Arc::new(config));

        assert!(registry.get("bounded-1").is_none());
        registry.container_for("bounded-1").offer(data("A"));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.partition_id(), 4);
        let container = registry.get("bounded-1").unwrap();
        assert_eq!(container.config().max_size, 3);
        assert_eq!(container.size(), 1);
    }

    #[test]
    fn test_registry_returns_same_container() {
        let mut registry = ContainerRegistry::new(0, Arc::new(ClusterConfig::default()));

        registry.container_for("q").offer(data("A"));
        registry.container_for("q").offer(data("B"));

        assert_eq!(registry.container_for("q").size(), 2);
    }

    #[test]
    fn test_remove_container_is_idempotent() {
        let mut registry = ContainerRegistry::new(0, Arc::new(ClusterConfig::default()));

        assert!(!registry.remove_container("never-created"));
        registry.container_for("q");
        assert!(registry.remove_container("q"));
        assert!(!registry.remove_container("q"));
        assert!(registry.is_empty());
    }

    // ============================================================
    // LISTENER REGISTRY TESTS
    // ============================================================

    #[test]
    fn test_listener_receives_events_with_and_without_values() {
        let listeners = ListenerRegistry::new();
        let with_value: Arc<Mutex<Vec<ItemEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let without_value: Arc<Mutex<Vec<ItemEvent>>> = Arc::new(Mutex::new(Vec::new()));

        let sink = with_value.clone();
        listeners.add(
            "q",
            Arc::new(move |event: &ItemEvent| -> anyhow::Result<()> {
                sink.lock().unwrap().push(event.clone());
                Ok(())
            }),
            true,
        );
        let sink = without_value.clone();
        listeners.add(
            "q",
            Arc::new(move |event: &ItemEvent| -> anyhow::Result<()> {
                sink.lock().unwrap().push(event.clone());
                Ok(())
            }),
            false,
        );

        listeners.dispatch(
            "q",
            ItemEventKind::Added,
            &[QueueItem::new(1, data("A"))],
            &MemberId::from("m1"),
        );

        let with_value = with_value.lock().unwrap();
        assert_eq!(with_value.len(), 1);
        assert_eq!(with_value[0].item, Some(data("A")));
        assert_eq!(with_value[0].kind, ItemEventKind::Added);
        assert_eq!(without_value.lock().unwrap()[0].item, None);
    }

    #[test]
    fn test_failing_listener_does_not_stop_others() {
        let listeners = ListenerRegistry::new();
        let delivered = Arc::new(Mutex::new(0));

        listeners.add(
            "q",
            Arc::new(|_: &ItemEvent| -> anyhow::Result<()> { Err(anyhow::anyhow!("listener down")) }),
            false,
        );
        let counter = delivered.clone();
        listeners.add(
            "q",
            Arc::new(move |_: &ItemEvent| -> anyhow::Result<()> {
                *counter.lock().unwrap() += 1;
                Ok(())
            }),
            false,
        );

        listeners.dispatch(
            "q",
            ItemEventKind::Removed,
            &[QueueItem::new(1, data("A")), QueueItem::new(2, data("B"))],
            &MemberId::from("m1"),
        );

        assert_eq!(*delivered.lock().unwrap(), 2);
    }

    #[test]
    fn test_remove_listener() {
        let listeners = ListenerRegistry::new();
        let id = listeners.add("q", Arc::new(|_: &ItemEvent| -> anyhow::Result<()> { Ok(()) }), false);

        assert!(listeners.has_listeners("q"));
        assert!(listeners.remove("q", id));
        assert!(!listeners.remove("q", id));
        assert!(!listeners.has_listeners("q"));
        assert_eq!(listeners.listener_count("other"), 0);
    }
}

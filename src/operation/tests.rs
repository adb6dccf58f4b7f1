//! Operation Module Tests
//!
//! ## Test Scopes
//! - **Run**: primary results, effects and application errors.
//! - **Backup derivation**: which primaries produce which backups.
//! - **Wire**: decode(encode(op)) behaves like op; schema version 1 records still decode.
//! - **Replica properties**: idempotent backups, and divergence when backups are reordered.

#[cfg(test)]
mod tests {
    use crate::config::{ClusterConfig, QueueConfig};
    use crate::container::registry::ContainerRegistry;
    use crate::error::{ApplicationErrorKind, DecodeError};
    use crate::operation::ops::{Effect, Operation, OperationKind, RunOutcome, WaitCondition};
    use crate::operation::registry::OperationRegistry;
    use crate::operation::types::{QUEUE_FACTORY_ID, QueueItem, Response, class_id};
    use crate::serialization::codec::{ObjectDataInput, ObjectDataOutput};
    use crate::serialization::versioned::{RecordHeader, encode_record};
    use bytes::Bytes;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    const QUEUE: &str = "orders";

    fn data(value: &'static str) -> Bytes {
        Bytes::from_static(value.as_bytes())
    }

    fn registry() -> ContainerRegistry {
        ContainerRegistry::new(0, Arc::new(ClusterConfig::default()))
    }

    fn bounded_registry(max_size: usize) -> ContainerRegistry {
        let config = ClusterConfig::default().with_queue(
            QUEUE,
            QueueConfig {
                max_size,
                ..QueueConfig::default()
            },
        );
        ContainerRegistry::new(0, Arc::new(config))
    }

    fn run(op: &Operation, containers: &mut ContainerRegistry) -> (Response, Effect) {
        match op.run(containers).unwrap() {
            RunOutcome::Done { response, effect } => (response, effect),
            RunOutcome::Wait(condition) => panic!("unexpected wait on {:?}", condition),
        }
    }

    fn offer(value: &'static str) -> Operation {
        Operation::new(
            QUEUE,
            OperationKind::Offer {
                data: data(value),
                timeout_ms: 0,
            },
        )
    }

    fn seeded(values: &[&'static str]) -> ContainerRegistry {
        let mut containers = registry();
        for value in values {
            run(&offer(value), &mut containers);
        }
        containers
    }

    fn contents(containers: &ContainerRegistry) -> Vec<QueueItem> {
        containers
            .get(QUEUE)
            .map(|container| container.items())
            .unwrap_or_default()
    }

    fn decode(op: &Operation) -> Result<Operation, DecodeError> {
        let registry = OperationRegistry::with_queue_operations();
        registry.read_operation(&mut ObjectDataInput::new(encode_record(op)))
    }

    // ============================================================
    // RUN TESTS
    // ============================================================

    #[test]
    fn test_offer_assigns_increasing_item_ids() {
        let mut containers = registry();

        let (first, first_effect) = run(&offer("A"), &mut containers);
        let (_, second_effect) = run(&offer("B"), &mut containers);

        assert_eq!(first, Response::Bool(true));
        assert_eq!(first_effect, Effect::Added(vec![QueueItem::new(1, data("A"))]));
        assert_eq!(second_effect, Effect::Added(vec![QueueItem::new(2, data("B"))]));
    }

    #[test]
    fn test_offer_null_item_is_application_error() {
        let mut containers = registry();
        let op = Operation::new(
            QUEUE,
            OperationKind::Offer {
                data: Bytes::new(),
                timeout_ms: 0,
            },
        );

        let error = op.run(&mut containers).unwrap_err();

        assert_eq!(error.kind, ApplicationErrorKind::NullItem);
    }

    #[test]
    fn test_offer_on_full_queue() {
        let mut containers = bounded_registry(1);
        run(&offer("A"), &mut containers);

        // Zero timeout fails fast
        let (response, effect) = run(&offer("B"), &mut containers);
        assert_eq!(response, Response::Bool(false));
        assert_eq!(effect, Effect::None);

        // A positive timeout parks until space frees up
        let waiting = Operation::new(
            QUEUE,
            OperationKind::Offer {
                data: data("B"),
                timeout_ms: 100,
            },
        );
        assert_eq!(
            waiting.run(&mut containers).unwrap(),
            RunOutcome::Wait(WaitCondition::SpaceAvailable)
        );
    }

    #[test]
    fn test_poll_on_empty_queue() {
        let mut containers = registry();

        let (response, _) = run(
            &Operation::new(QUEUE, OperationKind::Poll { timeout_ms: 0 }),
            &mut containers,
        );
        assert_eq!(response, Response::Item(None));

        let waiting = Operation::new(QUEUE, OperationKind::Poll { timeout_ms: -1 });
        assert_eq!(
            waiting.run(&mut containers).unwrap(),
            RunOutcome::Wait(WaitCondition::ItemAvailable)
        );
        assert_eq!(waiting.on_wait_timeout(), Response::Item(None));
    }

    #[test]
    fn test_poll_is_fifo() {
        let mut containers = seeded(&["A", "B"]);

        let (response, effect) = run(
            &Operation::new(QUEUE, OperationKind::Poll { timeout_ms: 0 }),
            &mut containers,
        );

        assert_eq!(response, Response::Item(Some(data("A"))));
        assert_eq!(effect, Effect::Removed(vec![QueueItem::new(1, data("A"))]));
    }

    #[test]
    fn test_add_all_respects_capacity() {
        let mut containers = bounded_registry(2);
        let op = Operation::new(
            QUEUE,
            OperationKind::AddAll {
                items: vec![data("A"), data("B"), data("C")],
            },
        );

        let (response, effect) = run(&op, &mut containers);

        assert_eq!(response, Response::Bool(false));
        assert_eq!(effect, Effect::None);
        assert!(contents(&containers).is_empty());
    }

    #[test]
    fn test_drain_with_limit_returns_head() {
        let mut containers = seeded(&["A", "B"]);

        let (response, effect) = run(
            &Operation::new(QUEUE, OperationKind::Drain { max_size: 1 }),
            &mut containers,
        );

        assert_eq!(response, Response::Items(vec![data("A")]));
        assert_eq!(effect, Effect::Removed(vec![QueueItem::new(1, data("A"))]));
        assert_eq!(contents(&containers), vec![QueueItem::new(2, data("B"))]);
    }

    #[test]
    fn test_compare_and_remove_retain_and_remove() {
        let mut containers = seeded(&["A", "B", "C"]);

        let retain = Operation::new(
            QUEUE,
            OperationKind::CompareAndRemove {
                items: vec![data("B")],
                retain: true,
            },
        );
        let (response, effect) = run(&retain, &mut containers);

        assert_eq!(response, Response::Bool(true));
        assert_eq!(
            effect,
            Effect::Removed(vec![QueueItem::new(1, data("A")), QueueItem::new(3, data("C"))])
        );

        let remove_missing = Operation::new(
            QUEUE,
            OperationKind::CompareAndRemove {
                items: vec![data("Z")],
                retain: false,
            },
        );
        let (response, _) = run(&remove_missing, &mut containers);
        assert_eq!(response, Response::Bool(false));
        assert_eq!(contents(&containers), vec![QueueItem::new(2, data("B"))]);
    }

    #[test]
    fn test_read_only_operations() {
        let mut containers = seeded(&["A", "B"]);

        let (size, _) = run(&Operation::new(QUEUE, OperationKind::Size), &mut containers);
        let (peek, _) = run(&Operation::new(QUEUE, OperationKind::Peek), &mut containers);
        let (all, _) = run(&Operation::new(QUEUE, OperationKind::Iterator), &mut containers);
        let (contains, _) = run(
            &Operation::new(
                QUEUE,
                OperationKind::Contains {
                    items: vec![data("A"), data("B")],
                },
            ),
            &mut containers,
        );

        assert_eq!(size, Response::Int(2));
        assert_eq!(peek, Response::Item(Some(data("A"))));
        assert_eq!(all, Response::Items(vec![data("A"), data("B")]));
        assert_eq!(contains, Response::Bool(true));
        assert_eq!(contents(&containers).len(), 2);
    }

    #[test]
    fn test_destroy_removes_container() {
        let mut containers = seeded(&["A"]);

        let (_, effect) = run(&Operation::new(QUEUE, OperationKind::Destroy), &mut containers);

        assert_eq!(effect, Effect::Destroyed);
        assert!(containers.get(QUEUE).is_none());
    }

    // ============================================================
    // BACKUP DERIVATION TESTS
    // ============================================================

    #[test]
    fn test_clear_backup_carries_removed_ids() {
        let mut containers = seeded(&["A", "B"]);
        let clear = Operation::new(QUEUE, OperationKind::Clear).with_call_id(7);

        let (_, effect) = run(&clear, &mut containers);
        let backup = clear.backup(&effect).unwrap();

        assert!(backup.is_backup());
        assert_eq!(backup.name(), QUEUE);
        assert_eq!(backup.call_id(), 7);
        assert_eq!(
            backup.kind(),
            &OperationKind::ClearBackup {
                item_ids: BTreeSet::from([1, 2])
            }
        );
    }

    #[test]
    fn test_empty_effect_produces_no_backup() {
        let mut containers = registry();
        let clear = Operation::new(QUEUE, OperationKind::Clear);
        let poll = Operation::new(QUEUE, OperationKind::Poll { timeout_ms: 0 });

        let (_, clear_effect) = run(&clear, &mut containers);
        let (_, poll_effect) = run(&poll, &mut containers);

        assert_eq!(clear.backup(&clear_effect), None);
        assert_eq!(poll.backup(&poll_effect), None);
        assert_eq!(Operation::new(QUEUE, OperationKind::Size).backup(&Effect::None), None);
    }

    #[test]
    fn test_backup_of_backup_is_none() {
        let backup = Operation::new(QUEUE, OperationKind::PollBackup { item_id: 1 });

        assert_eq!(
            backup.backup(&Effect::Removed(vec![QueueItem::new(1, data("A"))])),
            None
        );
    }

    // ============================================================
    // WIRE TESTS
    // ============================================================

    #[test]
    fn test_decoded_operations_behave_like_originals() {
        let ops = vec![
            offer("X"),
            Operation::new(QUEUE, OperationKind::AddAll { items: vec![data("X"), data("Y")] }),
            Operation::new(QUEUE, OperationKind::Poll { timeout_ms: 0 }),
            Operation::new(QUEUE, OperationKind::Peek),
            Operation::new(QUEUE, OperationKind::Size),
            Operation::new(QUEUE, OperationKind::Clear),
            Operation::new(QUEUE, OperationKind::Drain { max_size: 1 }),
            Operation::new(QUEUE, OperationKind::Contains { items: vec![data("B")] }),
            Operation::new(
                QUEUE,
                OperationKind::CompareAndRemove {
                    items: vec![data("A")],
                    retain: false,
                },
            ),
            Operation::new(QUEUE, OperationKind::Remove { data: data("B") }),
            Operation::new(QUEUE, OperationKind::Iterator),
            Operation::new(QUEUE, OperationKind::Destroy),
            Operation::new(QUEUE, OperationKind::OfferBackup { item: QueueItem::new(9, data("Z")) }),
            Operation::new(
                QUEUE,
                OperationKind::AddAllBackup {
                    items: vec![QueueItem::new(9, data("Z")), QueueItem::new(10, data("W"))],
                },
            ),
            Operation::new(QUEUE, OperationKind::PollBackup { item_id: 1 }),
            Operation::new(QUEUE, OperationKind::RemoveBackup { item_id: 2 }),
            Operation::new(QUEUE, OperationKind::ClearBackup { item_ids: BTreeSet::from([1, 2]) }),
            Operation::new(QUEUE, OperationKind::DrainBackup { item_ids: BTreeSet::from([1]) }),
            Operation::new(
                QUEUE,
                OperationKind::CompareAndRemoveBackup {
                    item_ids: BTreeSet::from([2]),
                },
            ),
            Operation::new(QUEUE, OperationKind::DestroyBackup),
        ];

        for op in ops {
            let op = op.with_call_id(42);
            let decoded = decode(&op).unwrap();
            assert_eq!(decoded, op);

            let mut original_state = seeded(&["A", "B"]);
            let mut decoded_state = seeded(&["A", "B"]);
            let original = run(&op, &mut original_state);
            let replayed = run(&decoded, &mut decoded_state);

            assert_eq!(original, replayed, "{:?}", op.kind());
            assert_eq!(contents(&original_state), contents(&decoded_state));
        }
    }

    #[test]
    fn test_version_one_record_decodes_without_call_id() {
        let mut out = ObjectDataOutput::new();
        RecordHeader::new(QUEUE_FACTORY_ID, class_id::POLL, 1).write_to(&mut out);
        out.write_string(QUEUE);
        out.write_i64(250);

        let registry = OperationRegistry::with_queue_operations();
        let op = registry
            .read_operation(&mut ObjectDataInput::new(out.freeze()))
            .unwrap();

        assert_eq!(op.kind(), &OperationKind::Poll { timeout_ms: 250 });
        assert_eq!(op.call_id(), 0);
    }

    #[test]
    fn test_truncated_operation_is_decode_error() {
        let bytes = encode_record(&offer("A"));

        let registry = OperationRegistry::with_queue_operations();
        let result = registry.read_operation(&mut ObjectDataInput::new(bytes.slice(..bytes.len() - 3)));

        assert!(matches!(result, Err(DecodeError::Truncated { .. })));
    }

    #[test]
    fn test_unknown_class_is_decode_error() {
        let mut out = ObjectDataOutput::new();
        RecordHeader::new(QUEUE_FACTORY_ID, 99, 2).write_to(&mut out);
        out.write_string(QUEUE);

        let registry = OperationRegistry::with_queue_operations();
        let result = registry.read_operation(&mut ObjectDataInput::new(out.freeze()));

        assert_eq!(
            result,
            Err(DecodeError::UnknownRecord {
                factory_id: QUEUE_FACTORY_ID,
                class_id: 99
            })
        );
    }

    #[test]
    fn test_registry_covers_every_class() {
        let registry = OperationRegistry::with_queue_operations();

        assert_eq!(registry.len(), 20);
        assert!(registry.is_registered(QUEUE_FACTORY_ID, class_id::CLEAR_BACKUP));
        assert!(!registry.is_registered(QUEUE_FACTORY_ID, class_id::ITEM_COLLECTION));
    }

    // ============================================================
    // REPLICA PROPERTY TESTS
    // ============================================================

    #[test]
    fn test_backup_applied_twice_equals_once() {
        let mut primary = seeded(&["A", "B", "C"]);
        let clear = Operation::new(QUEUE, OperationKind::Clear);
        let (_, effect) = run(&clear, &mut primary);
        let clear_backup = clear.backup(&effect).unwrap();

        let mut once = seeded(&["A", "B", "C"]);
        run(&clear_backup, &mut once);

        let mut twice = seeded(&["A", "B", "C"]);
        run(&clear_backup, &mut twice);
        run(&clear_backup, &mut twice);

        assert_eq!(contents(&once), contents(&twice));
        assert!(contents(&twice).is_empty());

        let offer_backup = Operation::new(
            QUEUE,
            OperationKind::OfferBackup {
                item: QueueItem::new(1, data("A")),
            },
        );
        let mut replica = registry();
        run(&offer_backup, &mut replica);
        run(&offer_backup, &mut replica);
        assert_eq!(contents(&replica), vec![QueueItem::new(1, data("A"))]);
    }

    #[test]
    fn test_backups_in_order_converge_and_reordered_diverge() {
        // Primary: P1 = offer A, P2 = poll
        let mut primary = registry();
        let p1 = offer("A");
        let (_, e1) = run(&p1, &mut primary);
        let p2 = Operation::new(QUEUE, OperationKind::Poll { timeout_ms: 0 });
        let (_, e2) = run(&p2, &mut primary);
        let b1 = p1.backup(&e1).unwrap();
        let b2 = p2.backup(&e2).unwrap();

        let mut in_order = registry();
        run(&b1, &mut in_order);
        run(&b2, &mut in_order);
        assert_eq!(contents(&in_order), contents(&primary));

        let mut reordered = registry();
        run(&b2, &mut reordered);
        run(&b1, &mut reordered);
        assert_ne!(contents(&reordered), contents(&primary));
    }
}

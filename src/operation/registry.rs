//! Operation Decoder Registry
//!
//! A lookup table from `(factory id, class id)` to the routine that decodes that
//! record's fields. Built once at node startup and shared read-only afterwards, so
//! the wire format stays stable and dispatch never inspects types at runtime.

use super::ops::{self, Operation, OperationKind};
use super::types::{OPERATION_VERSION, QUEUE_FACTORY_ID, class_id};
use crate::error::DecodeError;
use crate::serialization::codec::ObjectDataInput;
use crate::serialization::versioned::{VersionedInput, finish_record, open_record};

use std::collections::HashMap;
use std::sync::Arc;

/// Decodes the kind-specific fields of one operation class.
pub type DecodeFn = fn(&mut VersionedInput<'_>) -> Result<OperationKind, DecodeError>;

#[derive(Default)]
pub struct OperationRegistry {
    decoders: HashMap<(i32, i32), DecodeFn>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every queue primary and backup operation.
    pub fn with_queue_operations() -> Arc<Self> {
        let mut registry = Self::new();
        let table: [(i32, DecodeFn); 20] = [
            (class_id::OFFER, ops::read_offer),
            (class_id::ADD_ALL, ops::read_add_all),
            (class_id::POLL, ops::read_poll),
            (class_id::PEEK, ops::read_peek),
            (class_id::SIZE, ops::read_size),
            (class_id::CLEAR, ops::read_clear),
            (class_id::DRAIN, ops::read_drain),
            (class_id::CONTAINS, ops::read_contains),
            (class_id::COMPARE_AND_REMOVE, ops::read_compare_and_remove),
            (class_id::REMOVE, ops::read_remove),
            (class_id::ITERATOR, ops::read_iterator),
            (class_id::DESTROY, ops::read_destroy),
            (class_id::OFFER_BACKUP, ops::read_offer_backup),
            (class_id::ADD_ALL_BACKUP, ops::read_add_all_backup),
            (class_id::POLL_BACKUP, ops::read_poll_backup),
            (class_id::REMOVE_BACKUP, ops::read_remove_backup),
            (class_id::CLEAR_BACKUP, ops::read_clear_backup),
            (class_id::DRAIN_BACKUP, ops::read_drain_backup),
            (
                class_id::COMPARE_AND_REMOVE_BACKUP,
                ops::read_compare_and_remove_backup,
            ),
            (class_id::DESTROY_BACKUP, ops::read_destroy_backup),
        ];
        for (class_id, decode) in table {
            registry.register(QUEUE_FACTORY_ID, class_id, decode);
        }

        tracing::debug!("Registered {} operation decoders", registry.len());
        Arc::new(registry)
    }

    pub fn register(&mut self, factory_id: i32, class_id: i32, decode: DecodeFn) {
        self.decoders.insert((factory_id, class_id), decode);
    }

    pub fn is_registered(&self, factory_id: i32, class_id: i32) -> bool {
        self.decoders.contains_key(&(factory_id, class_id))
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Reads one operation record: header, name, kind fields, then the fields
    /// appended by later schema versions when the writer had them.
    pub fn read_operation(&self, input: &mut ObjectDataInput) -> Result<Operation, DecodeError> {
        let (operation, header) = {
            let mut record = open_record(input)?;
            let header = record.header();
            let decode = self
                .decoders
                .get(&(header.factory_id, header.class_id))
                .ok_or(DecodeError::UnknownRecord {
                    factory_id: header.factory_id,
                    class_id: header.class_id,
                })?;

            let name = record.read_string()?;
            let kind = decode(&mut record)?;
            let call_id = if record.since(2) { record.read_i64()? } else { 0 };

            (Operation::from_parts(name, call_id, kind), header)
        };

        finish_record(input, header, OPERATION_VERSION)?;
        Ok(operation)
    }
}

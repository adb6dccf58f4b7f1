//! Queue Operations
//!
//! An `Operation` is the serializable unit of work a proxy call turns into. It names
//! the queue it targets, carries its parameters in an `OperationKind`, and knows how
//! to run itself against the partition's `ContainerRegistry`.
//!
//! Primary kinds report an `Effect` (the exact items they added or removed). The
//! owner turns that effect into a backup kind through `Operation::backup`, so
//! replicas replay concrete item ids instead of re-deriving anything from their own
//! container state.
//!
//! ## Wire layout
//! ```text
//! [header: factory, class, version][name][kind fields...][call_id (v2+)]
//! ```

use super::types::{
    Data, ItemId, OPERATION_VERSION, QUEUE_FACTORY_ID, QueueItem, Response, class_id,
};
use crate::container::registry::ContainerRegistry;
use crate::error::{ApplicationError, DecodeError};
use crate::serialization::codec::ObjectDataOutput;
use crate::serialization::versioned::{RecordHeader, VersionedInput, VersionedRecord};

use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationKind {
    // --- Primaries ---
    /// `timeout_ms`: `0` fails fast on a full queue, negative waits forever.
    Offer { data: Data, timeout_ms: i64 },
    AddAll { items: Vec<Data> },
    /// `timeout_ms`: `0` returns immediately on an empty queue, negative waits forever.
    Poll { timeout_ms: i64 },
    Peek,
    Size,
    Clear,
    /// Negative `max_size` drains everything.
    Drain { max_size: i32 },
    Contains { items: Vec<Data> },
    CompareAndRemove { items: Vec<Data>, retain: bool },
    Remove { data: Data },
    Iterator,
    Destroy,

    // --- Backups ---
    OfferBackup { item: QueueItem },
    AddAllBackup { items: Vec<QueueItem> },
    PollBackup { item_id: ItemId },
    RemoveBackup { item_id: ItemId },
    ClearBackup { item_ids: BTreeSet<ItemId> },
    DrainBackup { item_ids: BTreeSet<ItemId> },
    CompareAndRemoveBackup { item_ids: BTreeSet<ItemId> },
    DestroyBackup,
}

/// What a primary run changed, in replica-safe terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    None,
    Added(Vec<QueueItem>),
    Removed(Vec<QueueItem>),
    Destroyed,
}

/// Condition a parked operation waits for before it is run again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaitCondition {
    ItemAvailable,
    SpaceAvailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Done { response: Response, effect: Effect },
    /// Nothing changed; run again once `WaitCondition` may hold or the wait expires.
    Wait(WaitCondition),
}

impl RunOutcome {
    fn done(response: Response, effect: Effect) -> Self {
        RunOutcome::Done { response, effect }
    }

    fn read_only(response: Response) -> Self {
        RunOutcome::Done {
            response,
            effect: Effect::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    name: String,
    call_id: i64,
    kind: OperationKind,
}

impl Operation {
    pub fn new(name: &str, kind: OperationKind) -> Self {
        Self {
            name: name.to_string(),
            call_id: 0,
            kind,
        }
    }

    pub(crate) fn from_parts(name: String, call_id: i64, kind: OperationKind) -> Self {
        Self {
            name,
            call_id,
            kind,
        }
    }

    pub fn with_call_id(mut self, call_id: i64) -> Self {
        self.call_id = call_id;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call_id(&self) -> i64 {
        self.call_id
    }

    pub fn kind(&self) -> &OperationKind {
        &self.kind
    }

    pub fn class_id(&self) -> i32 {
        match &self.kind {
            OperationKind::Offer { .. } => class_id::OFFER,
            OperationKind::AddAll { .. } => class_id::ADD_ALL,
            OperationKind::Poll { .. } => class_id::POLL,
            OperationKind::Peek => class_id::PEEK,
            OperationKind::Size => class_id::SIZE,
            OperationKind::Clear => class_id::CLEAR,
            OperationKind::Drain { .. } => class_id::DRAIN,
            OperationKind::Contains { .. } => class_id::CONTAINS,
            OperationKind::CompareAndRemove { .. } => class_id::COMPARE_AND_REMOVE,
            OperationKind::Remove { .. } => class_id::REMOVE,
            OperationKind::Iterator => class_id::ITERATOR,
            OperationKind::Destroy => class_id::DESTROY,
            OperationKind::OfferBackup { .. } => class_id::OFFER_BACKUP,
            OperationKind::AddAllBackup { .. } => class_id::ADD_ALL_BACKUP,
            OperationKind::PollBackup { .. } => class_id::POLL_BACKUP,
            OperationKind::RemoveBackup { .. } => class_id::REMOVE_BACKUP,
            OperationKind::ClearBackup { .. } => class_id::CLEAR_BACKUP,
            OperationKind::DrainBackup { .. } => class_id::DRAIN_BACKUP,
            OperationKind::CompareAndRemoveBackup { .. } => class_id::COMPARE_AND_REMOVE_BACKUP,
            OperationKind::DestroyBackup => class_id::DESTROY_BACKUP,
        }
    }

    /// Backup capability tag: this operation is applied on replicas only.
    pub fn is_backup(&self) -> bool {
        matches!(
            self.kind,
            OperationKind::OfferBackup { .. }
                | OperationKind::AddAllBackup { .. }
                | OperationKind::PollBackup { .. }
                | OperationKind::RemoveBackup { .. }
                | OperationKind::ClearBackup { .. }
                | OperationKind::DrainBackup { .. }
                | OperationKind::CompareAndRemoveBackup { .. }
                | OperationKind::DestroyBackup
        )
    }

    /// Owner-side wait budget for operations that may park.
    pub fn wait_timeout_ms(&self) -> Option<i64> {
        match &self.kind {
            OperationKind::Offer { timeout_ms, .. } | OperationKind::Poll { timeout_ms } => {
                Some(*timeout_ms)
            }
            _ => None,
        }
    }

    /// Response for a parked operation whose wait expired.
    pub fn on_wait_timeout(&self) -> Response {
        match &self.kind {
            OperationKind::Offer { .. } => Response::Bool(false),
            OperationKind::Poll { .. } => Response::Item(None),
            _ => Response::None,
        }
    }

    pub fn run(&self, containers: &mut ContainerRegistry) -> Result<RunOutcome, ApplicationError> {
        if let OperationKind::Destroy | OperationKind::DestroyBackup = self.kind {
            containers.remove_container(&self.name);
            let effect = if self.is_backup() {
                Effect::None
            } else {
                Effect::Destroyed
            };
            return Ok(RunOutcome::done(Response::None, effect));
        }

        let container = containers.container_for(&self.name);

        let outcome = match &self.kind {
            OperationKind::Offer { data, timeout_ms } => {
                reject_null(data)?;
                if container.has_capacity(1) {
                    let item = container.offer(data.clone());
                    RunOutcome::done(Response::Bool(true), Effect::Added(vec![item]))
                } else if *timeout_ms == 0 {
                    RunOutcome::read_only(Response::Bool(false))
                } else {
                    RunOutcome::Wait(WaitCondition::SpaceAvailable)
                }
            }
            OperationKind::AddAll { items } => {
                items.iter().try_for_each(reject_null)?;
                if items.is_empty() || !container.has_capacity(items.len()) {
                    RunOutcome::read_only(Response::Bool(false))
                } else {
                    let added = container.add_all(items.clone());
                    RunOutcome::done(Response::Bool(true), Effect::Added(added))
                }
            }
            OperationKind::Poll { timeout_ms } => match container.poll() {
                Some(item) => RunOutcome::done(
                    Response::Item(Some(item.data.clone())),
                    Effect::Removed(vec![item]),
                ),
                None if *timeout_ms == 0 => RunOutcome::read_only(Response::Item(None)),
                None => RunOutcome::Wait(WaitCondition::ItemAvailable),
            },
            OperationKind::Peek => {
                RunOutcome::read_only(Response::Item(container.peek().map(|item| item.data.clone())))
            }
            OperationKind::Size => {
                let size = i32::try_from(container.size()).unwrap_or(i32::MAX);
                RunOutcome::read_only(Response::Int(size))
            }
            OperationKind::Clear => RunOutcome::done(Response::None, Effect::Removed(container.clear())),
            OperationKind::Drain { max_size } => {
                let max = usize::try_from(*max_size).ok();
                let drained = container.drain(max);
                let values = drained.iter().map(|item| item.data.clone()).collect();
                RunOutcome::done(Response::Items(values), Effect::Removed(drained))
            }
            OperationKind::Contains { items } => {
                items.iter().try_for_each(reject_null)?;
                RunOutcome::read_only(Response::Bool(container.contains(items)))
            }
            OperationKind::CompareAndRemove { items, retain } => {
                items.iter().try_for_each(reject_null)?;
                let removed = container.compare_and_remove(items, *retain);
                RunOutcome::done(Response::Bool(!removed.is_empty()), Effect::Removed(removed))
            }
            OperationKind::Remove { data } => {
                reject_null(data)?;
                match container.remove(data) {
                    Some(item) => RunOutcome::done(Response::Bool(true), Effect::Removed(vec![item])),
                    None => RunOutcome::read_only(Response::Bool(false)),
                }
            }
            OperationKind::Iterator => RunOutcome::read_only(Response::Items(container.iterate_all())),
            OperationKind::OfferBackup { item } => {
                container.offer_backup(item.clone());
                RunOutcome::read_only(Response::Bool(true))
            }
            OperationKind::AddAllBackup { items } => {
                container.add_all_backup(items.clone());
                RunOutcome::read_only(Response::Bool(true))
            }
            OperationKind::PollBackup { item_id } | OperationKind::RemoveBackup { item_id } => {
                container.remove_backup(*item_id);
                RunOutcome::read_only(Response::Bool(true))
            }
            OperationKind::ClearBackup { item_ids }
            | OperationKind::DrainBackup { item_ids }
            | OperationKind::CompareAndRemoveBackup { item_ids } => {
                container.remove_all_backup(item_ids);
                RunOutcome::read_only(Response::Bool(true))
            }
            // Handled before the container lookup
            OperationKind::Destroy | OperationKind::DestroyBackup => {
                RunOutcome::read_only(Response::None)
            }
        };

        Ok(outcome)
    }

    /// Builds the replica-side counterpart of a completed primary run.
    ///
    /// `None` when the run changed nothing (including an empty affected-id set)
    /// or when `self` is already a backup.
    pub fn backup(&self, effect: &Effect) -> Option<Operation> {
        let kind = match (&self.kind, effect) {
            (OperationKind::Offer { .. }, Effect::Added(items)) => OperationKind::OfferBackup {
                item: items.first()?.clone(),
            },
            (OperationKind::AddAll { .. }, Effect::Added(items)) if !items.is_empty() => {
                OperationKind::AddAllBackup {
                    items: items.clone(),
                }
            }
            (OperationKind::Poll { .. }, Effect::Removed(items)) => OperationKind::PollBackup {
                item_id: items.first()?.item_id,
            },
            (OperationKind::Remove { .. }, Effect::Removed(items)) => OperationKind::RemoveBackup {
                item_id: items.first()?.item_id,
            },
            (OperationKind::Clear, Effect::Removed(items)) if !items.is_empty() => {
                OperationKind::ClearBackup {
                    item_ids: item_ids(items),
                }
            }
            (OperationKind::Drain { .. }, Effect::Removed(items)) if !items.is_empty() => {
                OperationKind::DrainBackup {
                    item_ids: item_ids(items),
                }
            }
            (OperationKind::CompareAndRemove { .. }, Effect::Removed(items))
                if !items.is_empty() =>
            {
                OperationKind::CompareAndRemoveBackup {
                    item_ids: item_ids(items),
                }
            }
            (OperationKind::Destroy, Effect::Destroyed) => OperationKind::DestroyBackup,
            _ => return None,
        };

        Some(Operation::from_parts(self.name.clone(), self.call_id, kind))
    }
}

fn reject_null(data: &Data) -> Result<(), ApplicationError> {
    if data.is_empty() {
        return Err(ApplicationError::null_item());
    }
    Ok(())
}

fn item_ids(items: &[QueueItem]) -> BTreeSet<ItemId> {
    items.iter().map(|item| item.item_id).collect()
}

impl VersionedRecord for Operation {
    fn header(&self) -> RecordHeader {
        RecordHeader::new(QUEUE_FACTORY_ID, self.class_id(), OPERATION_VERSION)
    }

    fn write_fields(&self, out: &mut ObjectDataOutput) {
        out.write_string(&self.name);

        match &self.kind {
            OperationKind::Offer { data, timeout_ms } => {
                out.write_byte_array(data);
                out.write_i64(*timeout_ms);
            }
            OperationKind::AddAll { items } | OperationKind::Contains { items } => {
                write_values(out, items);
            }
            OperationKind::Poll { timeout_ms } => out.write_i64(*timeout_ms),
            OperationKind::Drain { max_size } => out.write_i32(*max_size),
            OperationKind::CompareAndRemove { items, retain } => {
                write_values(out, items);
                out.write_bool(*retain);
            }
            OperationKind::Remove { data } => out.write_byte_array(data),
            OperationKind::OfferBackup { item } => write_item(out, item),
            OperationKind::AddAllBackup { items } => {
                out.write_len(items.len());
                for item in items {
                    write_item(out, item);
                }
            }
            OperationKind::PollBackup { item_id } | OperationKind::RemoveBackup { item_id } => {
                out.write_i64(*item_id);
            }
            OperationKind::ClearBackup { item_ids }
            | OperationKind::DrainBackup { item_ids }
            | OperationKind::CompareAndRemoveBackup { item_ids } => {
                out.write_len(item_ids.len());
                for item_id in item_ids {
                    out.write_i64(*item_id);
                }
            }
            OperationKind::Peek
            | OperationKind::Size
            | OperationKind::Clear
            | OperationKind::Iterator
            | OperationKind::Destroy
            | OperationKind::DestroyBackup => {}
        }

        // Since version 2
        out.write_i64(self.call_id);
    }
}

fn write_values(out: &mut ObjectDataOutput, values: &[Data]) {
    out.write_len(values.len());
    for value in values {
        out.write_byte_array(value);
    }
}

fn write_item(out: &mut ObjectDataOutput, item: &QueueItem) {
    out.write_i64(item.item_id);
    out.write_byte_array(&item.data);
}

// --- Per-class field decoders, registered in `OperationRegistry` ---

fn read_values(input: &mut VersionedInput<'_>) -> Result<Vec<Data>, DecodeError> {
    let len = input.read_len(4)?;
    let mut values = Vec::with_capacity(len);
    for _ in 0..len {
        values.push(input.read_byte_array()?);
    }
    Ok(values)
}

fn read_item(input: &mut VersionedInput<'_>) -> Result<QueueItem, DecodeError> {
    let item_id = input.read_i64()?;
    let data = input.read_byte_array()?;
    Ok(QueueItem::new(item_id, data))
}

fn read_item_ids(input: &mut VersionedInput<'_>) -> Result<BTreeSet<ItemId>, DecodeError> {
    let len = input.read_len(8)?;
    let mut item_ids = BTreeSet::new();
    for _ in 0..len {
        item_ids.insert(input.read_i64()?);
    }
    Ok(item_ids)
}

pub(crate) fn read_offer(input: &mut VersionedInput<'_>) -> Result<OperationKind, DecodeError> {
    Ok(OperationKind::Offer {
        data: input.read_byte_array()?,
        timeout_ms: input.read_i64()?,
    })
}

pub(crate) fn read_add_all(input: &mut VersionedInput<'_>) -> Result<OperationKind, DecodeError> {
    Ok(OperationKind::AddAll {
        items: read_values(input)?,
    })
}

pub(crate) fn read_poll(input: &mut VersionedInput<'_>) -> Result<OperationKind, DecodeError> {
    Ok(OperationKind::Poll {
        timeout_ms: input.read_i64()?,
    })
}

pub(crate) fn read_peek(_: &mut VersionedInput<'_>) -> Result<OperationKind, DecodeError> {
    Ok(OperationKind::Peek)
}

pub(crate) fn read_size(_: &mut VersionedInput<'_>) -> Result<OperationKind, DecodeError> {
    Ok(OperationKind::Size)
}

pub(crate) fn read_clear(_: &mut VersionedInput<'_>) -> Result<OperationKind, DecodeError> {
    Ok(OperationKind::Clear)
}

pub(crate) fn read_drain(input: &mut VersionedInput<'_>) -> Result<OperationKind, DecodeError> {
    Ok(OperationKind::Drain {
        max_size: input.read_i32()?,
    })
}

pub(crate) fn read_contains(input: &mut VersionedInput<'_>) -> Result<OperationKind, DecodeError> {
    Ok(OperationKind::Contains {
        items: read_values(input)?,
    })
}

pub(crate) fn read_compare_and_remove(
    input: &mut VersionedInput<'_>,
) -> Result<OperationKind, DecodeError> {
    let items = read_values(input)?;
    let retain = input.read_bool()?;
    Ok(OperationKind::CompareAndRemove { items, retain })
}

pub(crate) fn read_remove(input: &mut VersionedInput<'_>) -> Result<OperationKind, DecodeError> {
    Ok(OperationKind::Remove {
        data: input.read_byte_array()?,
    })
}

pub(crate) fn read_iterator(_: &mut VersionedInput<'_>) -> Result<OperationKind, DecodeError> {
    Ok(OperationKind::Iterator)
}

pub(crate) fn read_destroy(_: &mut VersionedInput<'_>) -> Result<OperationKind, DecodeError> {
    Ok(OperationKind::Destroy)
}

pub(crate) fn read_offer_backup(
    input: &mut VersionedInput<'_>,
) -> Result<OperationKind, DecodeError> {
    Ok(OperationKind::OfferBackup {
        item: read_item(input)?,
    })
}

pub(crate) fn read_add_all_backup(
    input: &mut VersionedInput<'_>,
) -> Result<OperationKind, DecodeError> {
    let len = input.read_len(12)?;
    let mut items = Vec::with_capacity(len);
    for _ in 0..len {
        items.push(read_item(input)?);
    }
    Ok(OperationKind::AddAllBackup { items })
}

pub(crate) fn read_poll_backup(
    input: &mut VersionedInput<'_>,
) -> Result<OperationKind, DecodeError> {
    Ok(OperationKind::PollBackup {
        item_id: input.read_i64()?,
    })
}

pub(crate) fn read_remove_backup(
    input: &mut VersionedInput<'_>,
) -> Result<OperationKind, DecodeError> {
    Ok(OperationKind::RemoveBackup {
        item_id: input.read_i64()?,
    })
}

pub(crate) fn read_clear_backup(
    input: &mut VersionedInput<'_>,
) -> Result<OperationKind, DecodeError> {
    Ok(OperationKind::ClearBackup {
        item_ids: read_item_ids(input)?,
    })
}

pub(crate) fn read_drain_backup(
    input: &mut VersionedInput<'_>,
) -> Result<OperationKind, DecodeError> {
    Ok(OperationKind::DrainBackup {
        item_ids: read_item_ids(input)?,
    })
}

pub(crate) fn read_compare_and_remove_backup(
    input: &mut VersionedInput<'_>,
) -> Result<OperationKind, DecodeError> {
    Ok(OperationKind::CompareAndRemoveBackup {
        item_ids: read_item_ids(input)?,
    })
}

pub(crate) fn read_destroy_backup(
    _: &mut VersionedInput<'_>,
) -> Result<OperationKind, DecodeError> {
    Ok(OperationKind::DestroyBackup)
}

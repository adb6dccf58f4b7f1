//! Queue Container
//!
//! The per-partition, per-name queue state. Primary effects assign item ids and
//! report exactly which items they touched; backup effects take those items or ids
//! and are safe to apply more than once.

use crate::config::QueueConfig;
use crate::operation::types::{Data, ItemId, QueueItem};

use std::collections::{BTreeSet, VecDeque};

/// Bounded FIFO of one named queue in one partition.
#[derive(Debug)]
pub struct QueueContainer {
    name: String,
    config: QueueConfig,
    items: VecDeque<QueueItem>,
    next_item_id: ItemId,
}

impl QueueContainer {
    /// Empty queue; item ids start at 1.
    pub fn new(name: &str, config: QueueConfig) -> Self {
        Self {
            name: name.to_string(),
            config,
            items: VecDeque::new(),
            next_item_id: 1,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Config resolved for this queue's name when it was created.
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Number of items currently held.
    pub fn size(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// `true` when `count` more items fit under `max_size`.
    pub fn has_capacity(&self, count: usize) -> bool {
        self.config.capacity().saturating_sub(self.items.len()) >= count
    }

    fn assign_id(&mut self) -> ItemId {
        let item_id = self.next_item_id;
        self.next_item_id += 1;
        item_id
    }

    // --- Primary effects ---

    /// Appends `data` under a fresh id. Capacity is checked by the caller.
    pub fn offer(&mut self, data: Data) -> QueueItem {
        let item = QueueItem::new(self.assign_id(), data);
        self.items.push_back(item.clone());
        item
    }

    /// Appends every value in order, each under its own id.
    pub fn add_all(&mut self, items: Vec<Data>) -> Vec<QueueItem> {
        items.into_iter().map(|data| self.offer(data)).collect()
    }

    /// Removes the head.
    pub fn poll(&mut self) -> Option<QueueItem> {
        self.items.pop_front()
    }

    /// The head, left in place.
    pub fn peek(&self) -> Option<&QueueItem> {
        self.items.front()
    }

    /// Removes everything and returns the removed items.
    pub fn clear(&mut self) -> Vec<QueueItem> {
        self.items.drain(..).collect()
    }

    /// Removes up to `max` items from the head; `None` drains everything.
    pub fn drain(&mut self, max: Option<usize>) -> Vec<QueueItem> {
        let count = max.map_or(self.items.len(), |max| max.min(self.items.len()));
        self.items.drain(..count).collect()
    }

    /// `true` when every value in `values` is present.
    pub fn contains(&self, values: &[Data]) -> bool {
        values
            .iter()
            .all(|value| self.items.iter().any(|item| &item.data == value))
    }

    /// Removes the first item equal to `value`.
    pub fn remove(&mut self, value: &Data) -> Option<QueueItem> {
        let index = self.items.iter().position(|item| &item.data == value)?;
        self.items.remove(index)
    }

    /// With `retain == false` removes every item whose value is in `values`;
    /// with `retain == true` removes every item whose value is not.
    pub fn compare_and_remove(&mut self, values: &[Data], retain: bool) -> Vec<QueueItem> {
        let mut removed = Vec::new();
        self.items.retain(|item| {
            let listed = values.contains(&item.data);
            if listed != retain {
                removed.push(item.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// Values in FIFO order.
    pub fn iterate_all(&self) -> Vec<Data> {
        self.items.iter().map(|item| item.data.clone()).collect()
    }

    /// Items with their ids, in FIFO order.
    pub fn items(&self) -> Vec<QueueItem> {
        self.items.iter().cloned().collect()
    }

    // --- Backup effects ---

    fn contains_id(&self, item_id: ItemId) -> bool {
        self.items.iter().any(|item| item.item_id == item_id)
    }

    /// Appends an item produced on the owner. A resend of the same id is a no-op.
    pub fn offer_backup(&mut self, item: QueueItem) {
        if self.contains_id(item.item_id) {
            return;
        }
        self.next_item_id = self.next_item_id.max(item.item_id + 1);
        self.items.push_back(item);
    }

    /// `offer_backup` for each item, in order.
    pub fn add_all_backup(&mut self, items: Vec<QueueItem>) {
        for item in items {
            self.offer_backup(item);
        }
    }

    /// Removes the item with `item_id` if it is still here.
    pub fn remove_backup(&mut self, item_id: ItemId) -> bool {
        match self.items.iter().position(|item| item.item_id == item_id) {
            Some(index) => self.items.remove(index).is_some(),
            None => false,
        }
    }

    /// Removes exactly the listed ids, ignoring any already gone.
    pub fn remove_all_backup(&mut self, item_ids: &BTreeSet<ItemId>) -> usize {
        let before = self.items.len();
        self.items.retain(|item| !item_ids.contains(&item.item_id));
        before - self.items.len()
    }
}

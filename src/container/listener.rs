//! Item Listener Registry
//!
//! Maps queue names to the listeners interested in them. Events are fired by the
//! owning member after a primary operation commits and its backups have been
//! handed to the replication channels. A listener that fails is logged and
//! otherwise ignored; it never fails or rolls back the operation.

use crate::membership::types::MemberId;
use crate::operation::types::{Data, QueueItem};

use anyhow::Result;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemEventKind {
    Added,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemEvent {
    pub name: String,
    pub kind: ItemEventKind,
    /// Present only for listeners registered with `include_value`.
    pub item: Option<Data>,
    pub member: MemberId,
}

pub trait ItemListener: Send + Sync {
    fn on_event(&self, event: &ItemEvent) -> Result<()>;
}

impl<F> ItemListener for F
where
    F: Fn(&ItemEvent) -> Result<()> + Send + Sync,
{
    fn on_event(&self, event: &ItemEvent) -> Result<()> {
        self(event)
    }
}

#[derive(Clone)]
struct Registration {
    id: Uuid,
    listener: Arc<dyn ItemListener>,
    include_value: bool,
}

#[derive(Default)]
pub struct ListenerRegistry {
    listeners: DashMap<String, Vec<Registration>>,
}

impl ListenerRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add(&self, name: &str, listener: Arc<dyn ItemListener>, include_value: bool) -> Uuid {
        let id = Uuid::new_v4();
        self.listeners
            .entry(name.to_string())
            .or_default()
            .push(Registration {
                id,
                listener,
                include_value,
            });

        tracing::info!("Registered item listener {} on {}", id, name);
        id
    }

    pub fn remove(&self, name: &str, registration_id: Uuid) -> bool {
        let Some(mut registrations) = self.listeners.get_mut(name) else {
            return false;
        };
        let before = registrations.len();
        registrations.retain(|registration| registration.id != registration_id);
        before != registrations.len()
    }

    pub fn has_listeners(&self, name: &str) -> bool {
        self.listeners
            .get(name)
            .map(|registrations| !registrations.is_empty())
            .unwrap_or(false)
    }

    pub fn listener_count(&self, name: &str) -> usize {
        self.listeners
            .get(name)
            .map(|registrations| registrations.len())
            .unwrap_or(0)
    }

    /// Delivers one event per item to every listener of `name`.
    pub fn dispatch(&self, name: &str, kind: ItemEventKind, items: &[QueueItem], member: &MemberId) {
        // Clone the registrations so no shard lock is held while user code runs
        let registrations = match self.listeners.get(name) {
            Some(registrations) => registrations.value().clone(),
            None => return,
        };

        for item in items {
            for registration in &registrations {
                let event = ItemEvent {
                    name: name.to_string(),
                    kind,
                    item: registration.include_value.then(|| item.data.clone()),
                    member: member.clone(),
                };
                if let Err(e) = registration.listener.on_event(&event) {
                    tracing::warn!(
                        "Item listener {} on {} failed: {}",
                        registration.id,
                        name,
                        e
                    );
                }
            }
        }
    }
}

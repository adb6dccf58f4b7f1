//! Container Module
//!
//! The mutable state operations act on.
//!
//! - **`queue`**: `QueueContainer`, a bounded FIFO whose items carry owner-assigned ids.
//! - **`registry`**: `ContainerRegistry`, the containers of a single partition, created
//!   on demand and owned by that partition's worker.
//! - **`listener`**: `ListenerRegistry`, item listeners notified after primary operations.

pub mod listener;
pub mod queue;
pub mod registry;

#[cfg(test)]
mod tests;

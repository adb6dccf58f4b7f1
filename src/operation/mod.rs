//! Operation Module
//!
//! Proxy calls never touch queue state directly. Each call becomes an `Operation`
//! that is routed to the partition owner, run there exactly once, and mirrored to
//! the backups through a derived backup operation.
//!
//! ## Submodules
//! - **`types`**: item, response and class-id definitions shared with the wire format.
//! - **`ops`**: the `Operation` itself: run, backup derivation, field encoding.
//! - **`registry`**: `(factory id, class id)` to decoder lookup table.

pub mod ops;
pub mod registry;
pub mod types;

#[cfg(test)]
mod tests;

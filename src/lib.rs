//! Distributed Queue Library
//!
//! A partitioned, replicated in-memory queue. Proxy calls never touch state
//! locally: each becomes a serializable operation routed to the member owning the
//! queue's partition, run there by that partition's single execution context, and
//! mirrored to backup replicas through replica-safe backup operations.
//!
//! ## Architecture Modules
//!
//! - **`serialization`**: big-endian primitive codec and the versioned record
//!   header (`factory id`, `class id`, `schema version`) every wire record carries.
//! - **`operation`**: queue operations, their backup counterparts and the decoder
//!   registry.
//! - **`container`**: the per-partition queue containers and item listeners.
//! - **`partition`**: name hashing and the owner/backup table.
//! - **`engine`**: partition workers, backup replication and the member node.
//! - **`invocation`**: wire packets, transports and the operation invoker.
//! - **`proxy`**: the typed client façade.
//! - **`cluster`**: an in-process multi-member cluster.

pub mod cluster;
pub mod config;
pub mod container;
pub mod engine;
pub mod error;
pub mod invocation;
pub mod membership;
pub mod operation;
pub mod partition;
pub mod proxy;
pub mod serialization;

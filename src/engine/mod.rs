//! Execution Engine
//!
//! The owner side of the invocation path.
//!
//! - **`worker`**: one single-threaded execution context per partition.
//! - **`replication`**: per-replica ordered backup delivery.
//! - **`node`**: a member; the decode boundary in front of the workers.

pub mod node;
pub mod replication;
pub mod worker;

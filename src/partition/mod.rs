//! Partition Routing Module
//!
//! ## Core Concepts
//! - **Hashing**: A name maps to a partition through MurmurHash3 of its bytes, modulo
//!   the partition count agreed at cluster formation.
//! - **Table**: `PartitionTable` is an immutable snapshot: owner plus ordered backups
//!   for every partition.
//! - **Router**: `PartitionRouter` serves lookups against the current snapshot and
//!   swaps in new snapshots atomically.

pub mod hash;
pub mod router;
pub mod table;

#[cfg(test)]
mod tests;

//! Serialization Module
//!
//! The byte-level substrate every operation and response travels through.
//!
//! - **`codec`**: `ObjectDataOutput` / `ObjectDataInput`, big-endian primitives and
//!   length-prefixed arrays with bounds-checked reads.
//! - **`versioned`**: the `[factory_id][class_id][version]` record header and the
//!   `VersionedInput` that exposes it to decoders, so members running different
//!   schema versions of a record can still exchange it.

pub mod codec;
pub mod versioned;

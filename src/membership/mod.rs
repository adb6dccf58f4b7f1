//! Member identity and the static member list.
//!
//! Failure detection and topology changes are not handled here; whoever embeds
//! the library publishes partition tables built from these ids.

pub mod types;

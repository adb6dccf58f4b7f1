//! Invocation Module
//!
//! The caller side of the invocation path and the wire it travels over.
//!
//! ## Submodules
//! - **`protocol`**: request/response packets and endpoint constants.
//! - **`transport`**: in-process and HTTP packet delivery.
//! - **`invoker`**: routing, retry on ownership churn, invocation futures.
//! - **`handlers`**: axum handlers for the node binary.

pub mod handlers;
pub mod invoker;
pub mod protocol;
pub mod transport;

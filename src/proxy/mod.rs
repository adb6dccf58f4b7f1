//! Client-facing proxies. Each call becomes an operation invoked on the owner of
//! the object's partition; nothing is applied locally.

pub mod queue;

//! Application layer: device communication, completion and callbacks.
//!
//! `DeviceProcessor` is the entry point the protocol engine drives. It hands
//! each transaction to a pool of `tokio` workers running the configured
//! strategy; async-mode transactions are finished later by the
//! `CallbackReceiver`.

pub mod callback;
pub mod completion;
pub mod processor;
pub mod strategy;

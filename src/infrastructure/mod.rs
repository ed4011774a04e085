//! Adapters implementing the domain ports.

pub mod http_device;
pub mod in_memory;
pub mod logging_engine;

//! Domain types and the ports through which the processor reaches its
//! collaborators.

pub mod device;
pub mod ports;
pub mod transaction;

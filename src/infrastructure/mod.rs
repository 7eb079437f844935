//! Infrastructure layer: I/O and external integrations.

pub mod config;
pub mod keys;
pub mod logging;
pub mod rpc;
pub mod storage;

//! RocksDB-backed storage.
//!
//! One `RocksStorage` holds blocks, logs and filters for any number of chains plus the
//! encrypted key ring. `RocksLogPollerOrm` scopes it to a single chain.

pub mod engine;
pub mod migration;
pub mod schema;
pub mod util;

pub use engine::{RocksLogPollerOrm, RocksStorage};

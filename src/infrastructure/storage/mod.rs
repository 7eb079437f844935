pub use memory::MemoryStorage;
pub use rocks::{RocksLogPollerOrm, RocksStorage};
pub use traits::*;
pub mod memory;
pub mod rocks;
pub mod traits;

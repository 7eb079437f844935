//! Chain client abstraction used by the log poller.

use crate::domain::logpoller::{Block, BlockTag, Log, LogQuery};
use crate::foundation::{BlockHash, ChainId, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;

pub mod circuit_breaker;
pub mod failover;
pub mod json_rpc;
pub mod retry;
pub mod simulated;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
pub use failover::FailoverChainClient;
pub use json_rpc::JsonRpcChainClient;
pub use simulated::{SimulatedChainClient, SimulatedLog};

/// Read access to an EVM-style chain.
///
/// Transport failures surface as `ChainClientTransient`; malformed payloads as
/// `ChainClientInvalidResponse`.
#[async_trait]
pub trait ChainClient: Send + Sync {
    fn chain_id(&self) -> ChainId;

    async fn header_by_number(&self, tag: BlockTag) -> Result<Block>;

    async fn header_by_hash(&self, hash: &BlockHash) -> Result<Block>;

    async fn filter_logs(&self, query: &LogQuery) -> Result<Vec<Log>>;

    /// New-head notifications, when the transport supports them.
    async fn subscribe_new_heads(&self) -> Result<Option<mpsc::Receiver<Block>>> {
        Ok(None)
    }
}

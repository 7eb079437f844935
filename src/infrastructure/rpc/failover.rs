//! Multi-endpoint chain client with per-endpoint circuit breakers.

use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use super::ChainClient;
use crate::domain::logpoller::{Block, BlockTag, Log, LogQuery};
use crate::foundation::{BlockHash, ChainId, NodeError, Result};
use async_trait::async_trait;
use log::{info, warn};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

struct Endpoint {
    client: Arc<dyn ChainClient>,
    breaker: CircuitBreaker,
}

/// Sends every call to the active endpoint and rotates to the next healthy one on transient failure.
///
/// The active endpoint can also be switched at runtime with [`FailoverChainClient::set_active`]
/// without restarting the poller that owns this client.
pub struct FailoverChainClient {
    chain_id: ChainId,
    endpoints: Vec<Endpoint>,
    active: AtomicUsize,
}

impl FailoverChainClient {
    pub fn new(clients: Vec<Arc<dyn ChainClient>>, breaker: CircuitBreakerConfig) -> Result<Self> {
        let Some(first) = clients.first() else {
            return Err(NodeError::ConfigError("failover client needs at least one endpoint".to_string()));
        };
        let chain_id = first.chain_id();
        if let Some(other) = clients.iter().find(|client| client.chain_id() != chain_id) {
            return Err(NodeError::ConfigError(format!("endpoint chain ids differ: {} vs {}", chain_id, other.chain_id())));
        }
        let endpoints = clients
            .into_iter()
            .enumerate()
            .map(|(idx, client)| Endpoint { client, breaker: CircuitBreaker::new(format!("endpoint-{}", idx), breaker) })
            .collect();
        Ok(Self { chain_id, endpoints, active: AtomicUsize::new(0) })
    }

    pub fn active_index(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    pub fn set_active(&self, index: usize) -> Result<()> {
        if index >= self.endpoints.len() {
            return Err(NodeError::ConfigError(format!("endpoint index {} out of range ({} endpoints)", index, self.endpoints.len())));
        }
        let previous = self.active.swap(index, Ordering::SeqCst);
        if previous != index {
            info!("chain client endpoint switched chain_id={} from={} to={}", self.chain_id, previous, index);
        }
        Ok(())
    }

    async fn call<T, F, Fut>(&self, operation: &str, f: F) -> Result<T>
    where
        F: Fn(Arc<dyn ChainClient>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let start = self.active_index();
        let mut last_err = None;
        for offset in 0..self.endpoints.len() {
            let index = (start + offset) % self.endpoints.len();
            let endpoint = &self.endpoints[index];
            if !endpoint.breaker.allow() {
                continue;
            }
            match f(Arc::clone(&endpoint.client)).await {
                Ok(value) => {
                    endpoint.breaker.record_success();
                    if index != start {
                        self.set_active(index)?;
                    }
                    return Ok(value);
                }
                Err(err) if err.is_transient() => {
                    warn!("chain client endpoint failed chain_id={} endpoint={} operation={} error={}", self.chain_id, index, operation, err);
                    endpoint.breaker.record_failure();
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_err.unwrap_or_else(|| NodeError::chain_transient(operation, "no healthy endpoint available")))
    }
}

#[async_trait]
impl ChainClient for FailoverChainClient {
    fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    async fn header_by_number(&self, tag: BlockTag) -> Result<Block> {
        self.call("header_by_number", |client| async move { client.header_by_number(tag).await }).await
    }

    async fn header_by_hash(&self, hash: &BlockHash) -> Result<Block> {
        let hash = *hash;
        self.call("header_by_hash", |client| async move { client.header_by_hash(&hash).await }).await
    }

    async fn filter_logs(&self, query: &LogQuery) -> Result<Vec<Log>> {
        self.call("filter_logs", |client| {
            let query = query.clone();
            async move { client.filter_logs(&query).await }
        })
        .await
    }

    async fn subscribe_new_heads(&self) -> Result<Option<mpsc::Receiver<Block>>> {
        let endpoint = &self.endpoints[self.active_index() % self.endpoints.len()];
        endpoint.client.subscribe_new_heads().await
    }
}

//! Chain log poller: keeps a reorg-consistent copy of blocks and matching logs in the ORM.
//!
//! # Cycle
//!
//! `Idle -> Reconciling -> Persisting -> Idle`. Reconciling compares the stored tip with the
//! chain and, on divergence, walks back by parent hash to the common ancestor and deletes the
//! stored suffix above it. Persisting backfills ranges below the finalized head in batches and
//! then writes every remaining block together with its logs in one atomic ORM call.
//!
//! # Locking
//!
//! `poll_lock` serializes cycles, replays and prune passes for this chain. Filters and phase
//! live behind short-lived sync locks that are never held across an await.

mod cycle;
mod reads;
mod replay;
mod runner;

pub use runner::LogPollerTask;

use crate::application::head_tracker::HeadTracker;
use crate::domain::logpoller::{validate_transition, Filter, PollPhase};
use crate::foundation::{
    ChainId, NodeError, Result, DEFAULT_BACKFILL_BATCH_SIZE, DEFAULT_POLL_PERIOD_MS, DEFAULT_PRUNE_PERIOD_SECS,
    DEFAULT_RPC_RETRY_ATTEMPTS, DEFAULT_RPC_RETRY_DELAY_MS,
};
use crate::infrastructure::config::{LogPollerConfig, RpcConfig};
use crate::infrastructure::rpc::ChainClient;
use crate::infrastructure::storage::LogPollerOrm;
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogPollerOptions {
    pub poll_period: Duration,
    pub backfill_batch_size: u64,
    /// Finalized blocks kept below the latest finalized block. 0 disables pruning.
    pub keep_finalized_blocks_depth: u64,
    /// First block to poll on an empty database. `None` starts at the finalized head.
    pub start_block: Option<u64>,
    pub prune_period: Duration,
    pub rpc_retry_attempts: usize,
    pub rpc_retry_delay: Duration,
}

impl Default for LogPollerOptions {
    fn default() -> Self {
        Self {
            poll_period: Duration::from_millis(DEFAULT_POLL_PERIOD_MS),
            backfill_batch_size: DEFAULT_BACKFILL_BATCH_SIZE,
            keep_finalized_blocks_depth: 0,
            start_block: None,
            prune_period: Duration::from_secs(DEFAULT_PRUNE_PERIOD_SECS),
            rpc_retry_attempts: DEFAULT_RPC_RETRY_ATTEMPTS,
            rpc_retry_delay: Duration::from_millis(DEFAULT_RPC_RETRY_DELAY_MS),
        }
    }
}

impl LogPollerOptions {
    pub fn from_config(poller: &LogPollerConfig, rpc: &RpcConfig) -> Self {
        Self {
            poll_period: poller.poll_period(),
            backfill_batch_size: poller.backfill_batch_size.max(1),
            keep_finalized_blocks_depth: poller.keep_finalized_blocks_depth,
            start_block: poller.start_block,
            prune_period: poller.prune_period(),
            rpc_retry_attempts: rpc.retry_attempts.max(1),
            rpc_retry_delay: rpc.retry_delay(),
        }
    }
}

/// Last detected reorg deeper than finality.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct FinalityViolation {
    block: u64,
    finalized: u64,
}

pub struct LogPoller {
    chain_id: ChainId,
    client: Arc<dyn ChainClient>,
    head_tracker: Arc<dyn HeadTracker>,
    orm: Arc<dyn LogPollerOrm>,
    options: LogPollerOptions,
    filters: RwLock<BTreeMap<String, Filter>>,
    poll_lock: tokio::sync::Mutex<()>,
    phase: Mutex<PollPhase>,
    finality_violation: Mutex<Option<FinalityViolation>>,
}

impl LogPoller {
    /// Builds a poller and reloads its persisted filters.
    pub fn new(
        client: Arc<dyn ChainClient>,
        head_tracker: Arc<dyn HeadTracker>,
        orm: Arc<dyn LogPollerOrm>,
        options: LogPollerOptions,
    ) -> Result<Self> {
        let chain_id = client.chain_id();
        if orm.chain_id() != chain_id {
            return Err(NodeError::ConfigError(format!("chain client is for chain {} but orm is scoped to {}", chain_id, orm.chain_id())));
        }
        let filters = orm.load_filters()?;
        info!(
            "log poller created chain_id={} filters={} backfill_batch_size={} start_block={:?}",
            chain_id,
            filters.len(),
            options.backfill_batch_size,
            options.start_block
        );
        Ok(Self {
            chain_id,
            client,
            head_tracker,
            orm,
            options,
            filters: RwLock::new(filters),
            poll_lock: tokio::sync::Mutex::new(()),
            phase: Mutex::new(PollPhase::Idle),
            finality_violation: Mutex::new(None),
        })
    }

    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    pub fn options(&self) -> &LogPollerOptions {
        &self.options
    }

    pub fn phase(&self) -> PollPhase {
        *self.phase.lock()
    }

    /// `FinalityViolation` while the last reconciliation found a reorg deeper than finality.
    pub fn healthy(&self) -> Result<()> {
        self.orm.health_check()?;
        match *self.finality_violation.lock() {
            Some(FinalityViolation { block, finalized }) => Err(NodeError::FinalityViolation { block, finalized }),
            None => Ok(()),
        }
    }

    /// Registers (or replaces) a named filter. Logs are fetched for it from the next cycle on.
    pub fn register_filter(&self, filter: Filter) -> Result<()> {
        validate_filter(&filter)?;
        if self.filters.read().get(&filter.name) == Some(&filter) {
            debug!("filter already registered chain_id={} name={}", self.chain_id, filter.name);
            return Ok(());
        }
        self.orm.insert_filter(&filter)?;
        info!(
            "filter registered chain_id={} name={} addresses={} event_sigs={}",
            self.chain_id,
            filter.name,
            filter.addresses.len(),
            filter.event_sigs.len()
        );
        self.filters.write().insert(filter.name.clone(), filter);
        Ok(())
    }

    pub fn unregister_filter(&self, name: &str) -> Result<()> {
        if !self.filters.read().contains_key(name) {
            warn!("unregister of unknown filter ignored chain_id={} name={}", self.chain_id, name);
            return Ok(());
        }
        self.orm.delete_filter(name)?;
        self.filters.write().remove(name);
        info!("filter unregistered chain_id={} name={}", self.chain_id, name);
        Ok(())
    }

    pub fn filters(&self) -> Vec<Filter> {
        self.filters.read().values().cloned().collect()
    }

    fn set_phase(&self, to: PollPhase) -> Result<()> {
        let mut phase = self.phase.lock();
        validate_transition(*phase, to)?;
        debug!("poll phase chain_id={} from={} to={}", self.chain_id, *phase, to);
        *phase = to;
        Ok(())
    }

    /// Returns to `Idle` from any phase; used when a cycle ends early.
    fn reset_phase(&self) {
        let mut phase = self.phase.lock();
        if *phase != PollPhase::Idle {
            debug!("poll phase chain_id={} from={} to={}", self.chain_id, *phase, PollPhase::Idle);
            *phase = PollPhase::Idle;
        }
    }
}

fn validate_filter(filter: &Filter) -> Result<()> {
    let invalid = |details: &str| Err(NodeError::InvalidFilter { name: filter.name.clone(), details: details.to_string() });
    if filter.name.trim().is_empty() {
        return invalid("name must not be empty");
    }
    if filter.addresses.is_empty() {
        return invalid("at least one address is required");
    }
    if filter.event_sigs.is_empty() {
        return invalid("at least one event signature is required");
    }
    Ok(())
}

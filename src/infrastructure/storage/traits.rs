use crate::domain::logpoller::{Filter, Log, StoredBlock};
use crate::foundation::{Address, ChainId, EventSig, Result};
use std::collections::BTreeMap;

/// Persistence for blocks, logs and filters of a single chain.
///
/// Range operations named `*_after(start)` include `start`. Logs are keyed by
/// `(block_number, log_index)` and returned in that order.
pub trait LogPollerOrm: Send + Sync {
    fn chain_id(&self) -> ChainId;

    fn insert_block(&self, block: &StoredBlock) -> Result<()>;
    fn select_block_by_number(&self, number: u64) -> Result<Option<StoredBlock>>;
    fn select_latest_block(&self) -> Result<Option<StoredBlock>>;
    fn select_latest_finalized_block(&self) -> Result<Option<StoredBlock>>;
    /// Blocks in `[start, end]`, ascending.
    fn select_blocks_range(&self, start: u64, end: u64) -> Result<Vec<StoredBlock>>;
    fn delete_blocks_after(&self, start: u64) -> Result<usize>;
    /// Deletes blocks below `end`. The latest stored block is always kept.
    fn delete_blocks_before(&self, end: u64) -> Result<usize>;

    /// Upserts logs; a log with the same `(block_number, log_index)` is replaced.
    fn insert_logs(&self, logs: &[Log]) -> Result<()>;
    /// Writes the block and its logs in one atomic batch.
    fn insert_logs_with_block(&self, logs: &[Log], block: &StoredBlock) -> Result<()>;
    fn delete_logs_after(&self, start: u64) -> Result<usize>;
    /// Removes logs and blocks `>= start` in one atomic batch.
    fn delete_logs_and_blocks_after(&self, start: u64) -> Result<()>;

    fn select_logs(&self, start: u64, end: u64, address: &Address, event_sig: &EventSig) -> Result<Vec<Log>>;
    fn select_logs_with_sigs(&self, start: u64, end: u64, address: &Address, event_sigs: &[EventSig]) -> Result<Vec<Log>>;
    fn select_latest_log_by_event_sig(&self, address: &Address, event_sig: &EventSig, max_block: u64) -> Result<Option<Log>>;

    fn insert_filter(&self, filter: &Filter) -> Result<()>;
    fn delete_filter(&self, name: &str) -> Result<()>;
    fn load_filters(&self) -> Result<BTreeMap<String, Filter>>;

    fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

pub(crate) fn log_matches(log: &Log, address: &Address, event_sigs: &[EventSig]) -> bool {
    &log.address == address && log.event_sig().map(|sig| event_sigs.contains(sig)).unwrap_or(false)
}

use crate::domain::logpoller::{Filter, Log, StoredBlock};
use crate::foundation::{Address, ChainId, EventSig, NodeError, Result};
use crate::infrastructure::storage::traits::{log_matches, LogPollerOrm};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct MemoryInner {
    blocks: BTreeMap<u64, StoredBlock>,
    logs: BTreeMap<(u64, u64), Log>,
    filters: BTreeMap<String, Filter>,
}

/// In-memory ORM for one chain. Cloning shares the underlying state.
#[derive(Clone)]
pub struct MemoryStorage {
    chain_id: ChainId,
    inner: Arc<Mutex<MemoryInner>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryStorage {
    pub fn new(chain_id: ChainId) -> Self {
        Self { chain_id, inner: Arc::new(Mutex::new(MemoryInner::default())), fail_writes: Arc::new(AtomicBool::new(false)) }
    }

    /// Makes every write fail with `StorageError` until reset.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn block_count(&self) -> Result<usize> {
        Ok(self.lock_inner()?.blocks.len())
    }

    pub fn all_logs(&self) -> Result<Vec<Log>> {
        Ok(self.lock_inner()?.logs.values().cloned().collect())
    }

    fn lock_inner(&self) -> Result<MutexGuard<'_, MemoryInner>> {
        self.inner
            .lock()
            .map_err(|_| NodeError::StorageError { operation: "memory storage lock".to_string(), details: "poisoned".to_string() })
    }

    fn lock_for_write(&self, operation: &str) -> Result<MutexGuard<'_, MemoryInner>> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(crate::storage_err!(operation, "memory storage configured to fail writes"));
        }
        self.lock_inner()
    }
}

impl MemoryInner {
    fn delete_blocks_from(&mut self, start: u64) -> usize {
        let removed = self.blocks.split_off(&start);
        removed.len()
    }

    fn delete_logs_from(&mut self, start: u64) -> usize {
        let removed = self.logs.split_off(&(start, 0));
        removed.len()
    }

    fn upsert_logs(&mut self, logs: &[Log]) {
        for log in logs {
            self.logs.insert((log.block_number, log.log_index), log.clone());
        }
    }
}

impl LogPollerOrm for MemoryStorage {
    fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    fn insert_block(&self, block: &StoredBlock) -> Result<()> {
        self.lock_for_write("insert_block")?.blocks.insert(block.number, block.clone());
        Ok(())
    }

    fn select_block_by_number(&self, number: u64) -> Result<Option<StoredBlock>> {
        Ok(self.lock_inner()?.blocks.get(&number).cloned())
    }

    fn select_latest_block(&self) -> Result<Option<StoredBlock>> {
        Ok(self.lock_inner()?.blocks.values().next_back().cloned())
    }

    fn select_latest_finalized_block(&self) -> Result<Option<StoredBlock>> {
        Ok(self.lock_inner()?.blocks.values().rev().find(|block| block.finalized).cloned())
    }

    fn select_blocks_range(&self, start: u64, end: u64) -> Result<Vec<StoredBlock>> {
        if start > end {
            return Ok(Vec::new());
        }
        Ok(self.lock_inner()?.blocks.range(start..=end).map(|(_, block)| block.clone()).collect())
    }

    fn delete_blocks_after(&self, start: u64) -> Result<usize> {
        Ok(self.lock_for_write("delete_blocks_after")?.delete_blocks_from(start))
    }

    fn delete_blocks_before(&self, end: u64) -> Result<usize> {
        let mut inner = self.lock_for_write("delete_blocks_before")?;
        let Some(&latest) = inner.blocks.keys().next_back() else {
            return Ok(0);
        };
        let keep_from = end.min(latest);
        let kept = inner.blocks.split_off(&keep_from);
        let removed = std::mem::replace(&mut inner.blocks, kept);
        Ok(removed.len())
    }

    fn insert_logs(&self, logs: &[Log]) -> Result<()> {
        self.lock_for_write("insert_logs")?.upsert_logs(logs);
        Ok(())
    }

    fn insert_logs_with_block(&self, logs: &[Log], block: &StoredBlock) -> Result<()> {
        let mut inner = self.lock_for_write("insert_logs_with_block")?;
        inner.upsert_logs(logs);
        inner.blocks.insert(block.number, block.clone());
        Ok(())
    }

    fn delete_logs_after(&self, start: u64) -> Result<usize> {
        Ok(self.lock_for_write("delete_logs_after")?.delete_logs_from(start))
    }

    fn delete_logs_and_blocks_after(&self, start: u64) -> Result<()> {
        let mut inner = self.lock_for_write("delete_logs_and_blocks_after")?;
        inner.delete_logs_from(start);
        inner.delete_blocks_from(start);
        Ok(())
    }

    fn select_logs(&self, start: u64, end: u64, address: &Address, event_sig: &EventSig) -> Result<Vec<Log>> {
        self.select_logs_with_sigs(start, end, address, std::slice::from_ref(event_sig))
    }

    fn select_logs_with_sigs(&self, start: u64, end: u64, address: &Address, event_sigs: &[EventSig]) -> Result<Vec<Log>> {
        if start > end {
            return Ok(Vec::new());
        }
        let inner = self.lock_inner()?;
        Ok(inner
            .logs
            .range((start, 0)..=(end, u64::MAX))
            .map(|(_, log)| log)
            .filter(|log| log_matches(log, address, event_sigs))
            .cloned()
            .collect())
    }

    fn select_latest_log_by_event_sig(&self, address: &Address, event_sig: &EventSig, max_block: u64) -> Result<Option<Log>> {
        let inner = self.lock_inner()?;
        Ok(inner
            .logs
            .range(..=(max_block, u64::MAX))
            .rev()
            .map(|(_, log)| log)
            .find(|log| log_matches(log, address, std::slice::from_ref(event_sig)))
            .cloned())
    }

    fn insert_filter(&self, filter: &Filter) -> Result<()> {
        self.lock_for_write("insert_filter")?.filters.insert(filter.name.clone(), filter.clone());
        Ok(())
    }

    fn delete_filter(&self, name: &str) -> Result<()> {
        self.lock_for_write("delete_filter")?.filters.remove(name);
        Ok(())
    }

    fn load_filters(&self) -> Result<BTreeMap<String, Filter>> {
        Ok(self.lock_inner()?.filters.clone())
    }
}

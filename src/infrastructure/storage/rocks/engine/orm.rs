use super::RocksStorage;
use crate::domain::logpoller::{Filter, Log, StoredBlock};
use crate::foundation::{Address, ChainId, EventSig, Result};
use crate::infrastructure::storage::rocks::schema::*;
use crate::infrastructure::storage::rocks::util::acquire_with_timeout;
use crate::infrastructure::storage::traits::{log_matches, LogPollerOrm};
use crate::storage_err;
use log::{debug, trace};
use rocksdb::WriteBatch;
use std::collections::BTreeMap;
use std::sync::Arc;

/// [`LogPollerOrm`] view of a [`RocksStorage`] for one chain.
#[derive(Clone)]
pub struct RocksLogPollerOrm {
    storage: Arc<RocksStorage>,
    chain_id: ChainId,
}

impl RocksLogPollerOrm {
    pub fn new(storage: Arc<RocksStorage>, chain_id: ChainId) -> Self {
        Self { storage, chain_id }
    }

    fn db(&self) -> &RocksStorage {
        &self.storage
    }

    fn put_block(&self, batch: &mut WriteBatch, block: &StoredBlock) -> Result<()> {
        let cf = self.db().cf_handle(CF_BLOCKS)?;
        batch.put_cf(cf, key_block(self.chain_id, block.number), RocksStorage::encode(block)?);
        Ok(())
    }

    fn put_logs(&self, batch: &mut WriteBatch, logs: &[Log]) -> Result<()> {
        let cf = self.db().cf_handle(CF_LOGS)?;
        for log in logs {
            batch.put_cf(cf, key_log(self.chain_id, log.block_number, log.log_index), RocksStorage::encode(log)?);
        }
        Ok(())
    }

    fn delete_blocks_from(&self, batch: &mut WriteBatch, start: u64) -> Result<usize> {
        let prefix = key_block_prefix(self.chain_id);
        let keys = self.db().keys_forward(CF_BLOCKS, &prefix, &key_block(self.chain_id, start), None)?;
        let cf = self.db().cf_handle(CF_BLOCKS)?;
        for key in &keys {
            batch.delete_cf(cf, key);
        }
        Ok(keys.len())
    }

    fn delete_logs_from(&self, batch: &mut WriteBatch, start: u64) -> Result<usize> {
        let prefix = key_log_prefix(self.chain_id);
        let keys = self.db().keys_forward(CF_LOGS, &prefix, &key_log(self.chain_id, start, 0), None)?;
        let cf = self.db().cf_handle(CF_LOGS)?;
        for key in &keys {
            batch.delete_cf(cf, key);
        }
        Ok(keys.len())
    }

    fn write(&self, batch: WriteBatch) -> Result<()> {
        self.db().db.write(batch).map_err(|err| storage_err!("rocksdb write batch", err))
    }

    fn logs_in_range(&self, start: u64, end: u64) -> Result<Vec<Log>> {
        if start > end {
            return Ok(Vec::new());
        }
        let prefix = key_log_prefix(self.chain_id);
        let through = key_log(self.chain_id, end, u64::MAX);
        let rows = self.db().scan_forward::<Log>(CF_LOGS, &prefix, &key_log(self.chain_id, start, 0), Some(&through))?;
        Ok(rows.into_iter().map(|(_, log)| log).collect())
    }
}

impl LogPollerOrm for RocksLogPollerOrm {
    fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    fn insert_block(&self, block: &StoredBlock) -> Result<()> {
        trace!("insert_block chain_id={} number={} hash={}", self.chain_id, block.number, block.hash);
        let _guard = acquire_with_timeout(&self.db().chain_lock, "insert_block")?;
        let mut batch = WriteBatch::default();
        self.put_block(&mut batch, block)?;
        self.write(batch)
    }

    fn select_block_by_number(&self, number: u64) -> Result<Option<StoredBlock>> {
        let cf = self.db().cf_handle(CF_BLOCKS)?;
        let value = self.db().db.get_cf(cf, key_block(self.chain_id, number)).map_err(|err| storage_err!("rocksdb get_cf block", err))?;
        value.map(|bytes| RocksStorage::decode(&bytes)).transpose()
    }

    fn select_latest_block(&self) -> Result<Option<StoredBlock>> {
        let prefix = key_block_prefix(self.chain_id);
        self.db().find_backward::<StoredBlock>(CF_BLOCKS, &prefix, &key_block(self.chain_id, u64::MAX), |_| true)
    }

    fn select_latest_finalized_block(&self) -> Result<Option<StoredBlock>> {
        let prefix = key_block_prefix(self.chain_id);
        self.db().find_backward::<StoredBlock>(CF_BLOCKS, &prefix, &key_block(self.chain_id, u64::MAX), |block| block.finalized)
    }

    fn select_blocks_range(&self, start: u64, end: u64) -> Result<Vec<StoredBlock>> {
        if start > end {
            return Ok(Vec::new());
        }
        let prefix = key_block_prefix(self.chain_id);
        let through = key_block(self.chain_id, end);
        let rows = self.db().scan_forward::<StoredBlock>(CF_BLOCKS, &prefix, &key_block(self.chain_id, start), Some(&through))?;
        Ok(rows.into_iter().map(|(_, block)| block).collect())
    }

    fn delete_blocks_after(&self, start: u64) -> Result<usize> {
        let _guard = acquire_with_timeout(&self.db().chain_lock, "delete_blocks_after")?;
        let mut batch = WriteBatch::default();
        let removed = self.delete_blocks_from(&mut batch, start)?;
        self.write(batch)?;
        debug!("delete_blocks_after chain_id={} start={} removed={}", self.chain_id, start, removed);
        Ok(removed)
    }

    fn delete_blocks_before(&self, end: u64) -> Result<usize> {
        let _guard = acquire_with_timeout(&self.db().chain_lock, "delete_blocks_before")?;
        let Some(latest) = self.select_latest_block()? else {
            return Ok(0);
        };
        let keep_from = end.min(latest.number);
        if keep_from == 0 {
            return Ok(0);
        }
        let prefix = key_block_prefix(self.chain_id);
        let through = key_block(self.chain_id, keep_from - 1);
        let keys = self.db().keys_forward(CF_BLOCKS, &prefix, &prefix, Some(&through))?;
        let cf = self.db().cf_handle(CF_BLOCKS)?;
        let mut batch = WriteBatch::default();
        for key in &keys {
            batch.delete_cf(cf, key);
        }
        let removed = keys.len();
        trace!("pruning blocks chain_id={} below={} removed={}", self.chain_id, keep_from, removed);
        self.write(batch)?;
        Ok(removed)
    }

    fn insert_logs(&self, logs: &[Log]) -> Result<()> {
        let _guard = acquire_with_timeout(&self.db().chain_lock, "insert_logs")?;
        let mut batch = WriteBatch::default();
        self.put_logs(&mut batch, logs)?;
        self.write(batch)
    }

    fn insert_logs_with_block(&self, logs: &[Log], block: &StoredBlock) -> Result<()> {
        trace!("insert_logs_with_block chain_id={} number={} logs={}", self.chain_id, block.number, logs.len());
        let _guard = acquire_with_timeout(&self.db().chain_lock, "insert_logs_with_block")?;
        let mut batch = WriteBatch::default();
        self.put_logs(&mut batch, logs)?;
        self.put_block(&mut batch, block)?;
        self.write(batch)
    }

    fn delete_logs_after(&self, start: u64) -> Result<usize> {
        let _guard = acquire_with_timeout(&self.db().chain_lock, "delete_logs_after")?;
        let mut batch = WriteBatch::default();
        let removed = self.delete_logs_from(&mut batch, start)?;
        self.write(batch)?;
        Ok(removed)
    }

    fn delete_logs_and_blocks_after(&self, start: u64) -> Result<()> {
        let _guard = acquire_with_timeout(&self.db().chain_lock, "delete_logs_and_blocks_after")?;
        let mut batch = WriteBatch::default();
        let logs = self.delete_logs_from(&mut batch, start)?;
        let blocks = self.delete_blocks_from(&mut batch, start)?;
        self.write(batch)?;
        debug!("delete_logs_and_blocks_after chain_id={} start={} blocks={} logs={}", self.chain_id, start, blocks, logs);
        Ok(())
    }

    fn select_logs(&self, start: u64, end: u64, address: &Address, event_sig: &EventSig) -> Result<Vec<Log>> {
        self.select_logs_with_sigs(start, end, address, std::slice::from_ref(event_sig))
    }

    fn select_logs_with_sigs(&self, start: u64, end: u64, address: &Address, event_sigs: &[EventSig]) -> Result<Vec<Log>> {
        Ok(self.logs_in_range(start, end)?.into_iter().filter(|log| log_matches(log, address, event_sigs)).collect())
    }

    fn select_latest_log_by_event_sig(&self, address: &Address, event_sig: &EventSig, max_block: u64) -> Result<Option<Log>> {
        let prefix = key_log_prefix(self.chain_id);
        self.db().find_backward::<Log>(CF_LOGS, &prefix, &key_log(self.chain_id, max_block, u64::MAX), |log| {
            log_matches(log, address, std::slice::from_ref(event_sig))
        })
    }

    fn insert_filter(&self, filter: &Filter) -> Result<()> {
        let _guard = acquire_with_timeout(&self.db().chain_lock, "insert_filter")?;
        let cf = self.db().cf_handle(CF_FILTERS)?;
        self.db()
            .db
            .put_cf(cf, key_filter(self.chain_id, &filter.name), RocksStorage::encode(filter)?)
            .map_err(|err| storage_err!("rocksdb put_cf filter", err))
    }

    fn delete_filter(&self, name: &str) -> Result<()> {
        let _guard = acquire_with_timeout(&self.db().chain_lock, "delete_filter")?;
        let cf = self.db().cf_handle(CF_FILTERS)?;
        self.db().db.delete_cf(cf, key_filter(self.chain_id, name)).map_err(|err| storage_err!("rocksdb delete_cf filter", err))
    }

    fn load_filters(&self) -> Result<BTreeMap<String, Filter>> {
        let prefix = key_filter_prefix(self.chain_id);
        let rows = self.db().scan_forward::<Filter>(CF_FILTERS, &prefix, &prefix, None)?;
        Ok(rows.into_iter().map(|(_, filter)| (filter.name.clone(), filter)).collect())
    }

    fn health_check(&self) -> Result<()> {
        self.db().cf_handle(CF_BLOCKS).map(|_| ())
    }
}

use super::{FinalityViolation, LogPoller};
use crate::domain::logpoller::{Block, BlockTag, Log, LogQuery, LogRange, PollPhase, StoredBlock};
use crate::foundation::{BlockHash, NodeError, Result};
use crate::infrastructure::rpc::retry::retry;
use log::{debug, error, info, trace, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use tokio_util::sync::CancellationToken;

impl LogPoller {
    /// Runs one cycle starting at `current_block`. Errors are logged, never returned.
    pub async fn poll_and_save_logs(&self, cancel: &CancellationToken, current_block: u64) {
        let _guard = tokio::select! {
            _ = cancel.cancelled() => return,
            guard = self.poll_lock.lock() => guard,
        };
        self.cycle_locked(cancel, current_block).await;
    }

    /// Polls from the block after the highest stored one, or from the configured start.
    /// The start point is read under `poll_lock` so concurrent callers never repeat a range.
    pub async fn poll(&self, cancel: &CancellationToken) {
        let _guard = tokio::select! {
            _ = cancel.cancelled() => return,
            guard = self.poll_lock.lock() => guard,
        };
        match self.next_block_to_poll(cancel).await {
            Ok(next) => self.cycle_locked(cancel, next).await,
            Err(err) => self.log_cycle_result(0, Err(err)),
        }
    }

    async fn cycle_locked(&self, cancel: &CancellationToken, current_block: u64) {
        let result = self.run_cycle(cancel, current_block).await;
        self.reset_phase();
        self.log_cycle_result(current_block, result);
    }

    async fn next_block_to_poll(&self, cancel: &CancellationToken) -> Result<u64> {
        if let Some(latest) = self.orm.select_latest_block()? {
            return Ok(latest.number + 1);
        }
        if let Some(start) = self.options.start_block {
            return Ok(start);
        }
        let (_, finalized) = self.heads(cancel).await?;
        info!("no stored blocks; starting at finalized head chain_id={} block={}", self.chain_id, finalized.number);
        Ok(finalized.number)
    }

    fn log_cycle_result(&self, current_block: u64, result: Result<()>) {
        let Err(err) = result else {
            return;
        };
        match &err {
            NodeError::Cancelled => debug!("poll cycle cancelled chain_id={} from={}", self.chain_id, current_block),
            NodeError::FinalityViolation { .. } => error!("poll cycle aborted chain_id={} from={} error={}", self.chain_id, current_block, err),
            NodeError::ReconciliationFailed { .. } => error!("poll cycle aborted chain_id={} from={} error={}", self.chain_id, current_block, err),
            err if err.is_transient() => warn!("poll cycle failed, retrying next tick chain_id={} from={} error={}", self.chain_id, current_block, err),
            err => error!("poll cycle failed chain_id={} from={} error={}", self.chain_id, current_block, err),
        }
    }

    /// One full cycle. The caller holds `poll_lock`.
    pub(super) async fn run_cycle(&self, cancel: &CancellationToken, current_block: u64) -> Result<()> {
        check_cancelled(cancel)?;
        self.set_phase(PollPhase::Reconciling)?;
        let (latest, finalized) = self.heads(cancel).await?;
        let start = match self.reconcile(cancel, current_block, &latest).await {
            Ok(start) => start,
            Err(err) => {
                if let NodeError::FinalityViolation { block, finalized } = err {
                    *self.finality_violation.lock() = Some(FinalityViolation { block, finalized });
                }
                return Err(err);
            }
        };
        if start > latest.number {
            trace!("no new blocks chain_id={} next={} latest={}", self.chain_id, start, latest.number);
            self.finality_violation.lock().take();
            self.set_phase(PollPhase::Idle)?;
            return Ok(());
        }

        self.set_phase(PollPhase::Persisting)?;
        let mut next = start;
        if finalized.number > 0 && next < finalized.number {
            self.backfill(cancel, next, finalized.number - 1, finalized.number).await?;
            next = finalized.number;
        }
        let persisted_to = self.persist_blocks(cancel, next, &latest, finalized.number).await?;
        self.finality_violation.lock().take();
        self.set_phase(PollPhase::Idle)?;
        if let Some(to) = persisted_to {
            debug!("poll cycle complete chain_id={} from={} to={} finalized={}", self.chain_id, start, to, finalized.number);
        }
        Ok(())
    }

    pub(super) async fn heads(&self, cancel: &CancellationToken) -> Result<(Block, Block)> {
        self.chain_call(cancel, "latest_and_finalized", || self.head_tracker.latest_and_finalized()).await
    }

    /// Returns the first block to persist. Deletes the stored suffix above the common ancestor
    /// when the stored tip is no longer canonical. A chain head below the stored tip deletes
    /// nothing; the tip is checked again once the chain reaches it.
    async fn reconcile(&self, cancel: &CancellationToken, current_block: u64, latest: &Block) -> Result<u64> {
        if current_block == 0 {
            return Ok(0);
        }
        let Some(stored_tip) = self.orm.select_block_by_number(current_block - 1)? else {
            // nothing stored below the start point: first poll, or replay above a gap
            return Ok(current_block);
        };
        if latest.number < stored_tip.number {
            debug!(
                "chain head behind stored tip, waiting chain_id={} latest={} stored_tip={}",
                self.chain_id, latest.number, stored_tip.number
            );
            return Ok(current_block);
        }
        let chain_at_tip = self.header_by_number(cancel, stored_tip.number).await?;
        if chain_at_tip.hash == stored_tip.hash {
            return Ok(current_block);
        }

        warn!(
            "reorg detected chain_id={} block={} stored_hash={} chain_hash={}",
            self.chain_id, chain_at_tip.number, stored_tip.hash, chain_at_tip.hash
        );
        let ancestor = self.find_common_ancestor(cancel, chain_at_tip).await?;
        self.orm.delete_logs_and_blocks_after(ancestor + 1)?;
        info!("reorg reconciled chain_id={} common_ancestor={} removed_from={}", self.chain_id, ancestor, ancestor + 1);
        Ok(ancestor + 1)
    }

    /// Walks back from `cursor` by parent hash until a stored block has the same hash.
    /// Fails with `FinalityViolation` when the suffix to delete would reach a finalized block.
    async fn find_common_ancestor(&self, cancel: &CancellationToken, mut cursor: Block) -> Result<u64> {
        let finalized = self.orm.select_latest_finalized_block()?.map(|block| block.number);
        loop {
            check_cancelled(cancel)?;
            let stored = self.orm.select_block_by_number(cursor.number)?;
            if let Some(stored) = &stored {
                if stored.hash == cursor.hash {
                    if let Some(finalized) = finalized.filter(|f| cursor.number < *f) {
                        return Err(NodeError::FinalityViolation { block: cursor.number + 1, finalized });
                    }
                    return Ok(cursor.number);
                }
            }
            if let Some(finalized) = finalized.filter(|f| cursor.number <= *f) {
                return Err(NodeError::FinalityViolation { block: cursor.number, finalized });
            }
            if stored.is_none() {
                return Err(NodeError::ReconciliationFailed {
                    block: cursor.number,
                    details: "no stored block to compare against".to_string(),
                });
            }
            if cursor.number == 0 {
                return Err(NodeError::ReconciliationFailed { block: 0, details: "no common ancestor down to genesis".to_string() });
            }
            trace!("walking back chain_id={} block={} parent={}", self.chain_id, cursor.number, cursor.parent_hash);
            cursor = self.header_by_hash(cancel, cursor.parent_hash).await?;
        }
    }

    /// Fetches logs for `[from, to]` with ranged queries. Each batch is written together with
    /// the header of its last block.
    pub(super) async fn backfill(&self, cancel: &CancellationToken, from: u64, to: u64, finalized: u64) -> Result<()> {
        let batch = self.options.backfill_batch_size.max(1);
        info!("backfill start chain_id={} from={} to={} batch_size={}", self.chain_id, from, to, batch);
        let mut start = from;
        while start <= to {
            check_cancelled(cancel)?;
            let end = start.saturating_add(batch - 1).min(to);
            let logs = self.fetch_logs(cancel, LogRange::Blocks { from: start, to: end }).await?;
            let logs = self.with_block_timestamps(cancel, logs).await?;
            let end_block = self.header_by_number(cancel, end).await?;
            check_cancelled(cancel)?;
            self.orm.insert_logs_with_block(&logs, &StoredBlock::from_block(self.chain_id, &end_block, finalized))?;
            debug!("backfill batch chain_id={} from={} to={} logs={}", self.chain_id, start, end, logs.len());
            start = end + 1;
        }
        Ok(())
    }

    /// Writes `from..=latest` one block at a time. Returns the last persisted block number.
    async fn persist_blocks(&self, cancel: &CancellationToken, from: u64, latest: &Block, finalized: u64) -> Result<Option<u64>> {
        let mut parent: Option<BlockHash> = match from.checked_sub(1) {
            Some(prev) => self.orm.select_block_by_number(prev)?.map(|block| block.hash),
            None => None,
        };
        let mut persisted = None;
        for number in from..=latest.number {
            check_cancelled(cancel)?;
            let block = self.header_by_number(cancel, number).await?;
            if let Some(expected) = parent {
                if block.parent_hash != expected {
                    info!("chain moved while polling chain_id={} block={}; reconciling next cycle", self.chain_id, number);
                    break;
                }
            }
            let logs = self.fetch_logs(cancel, LogRange::BlockHash(block.hash)).await?;
            let logs = logs
                .into_iter()
                .map(|mut log| {
                    log.block_timestamp = block.timestamp;
                    log
                })
                .collect::<Vec<_>>();
            check_cancelled(cancel)?;
            self.orm.insert_logs_with_block(&logs, &StoredBlock::from_block(self.chain_id, &block, finalized))?;
            trace!("block persisted chain_id={} number={} logs={}", self.chain_id, number, logs.len());
            parent = Some(block.hash);
            persisted = Some(number);
        }
        Ok(persisted)
    }

    /// Logs in `range` that match a registered filter. Empty without filters.
    pub(super) async fn fetch_logs(&self, cancel: &CancellationToken, range: LogRange) -> Result<Vec<Log>> {
        let filters = self.filters();
        if filters.is_empty() {
            return Ok(Vec::new());
        }
        let addresses: BTreeSet<_> = filters.iter().flat_map(|f| f.addresses.iter().copied()).collect();
        let event_sigs: BTreeSet<_> = filters.iter().flat_map(|f| f.event_sigs.iter().copied()).collect();
        let query = LogQuery { range, addresses: addresses.into_iter().collect(), event_sigs: event_sigs.into_iter().collect() };
        let logs = self.chain_call(cancel, "filter_logs", || self.client.filter_logs(&query)).await?;
        // the union query over-matches address/sig pairs from different filters
        Ok(logs.into_iter().filter(|log| filters.iter().any(|f| f.matches(log))).collect())
    }

    /// Fills `block_timestamp` from block headers for logs whose node omitted it.
    pub(super) async fn with_block_timestamps(&self, cancel: &CancellationToken, mut logs: Vec<Log>) -> Result<Vec<Log>> {
        let mut timestamps: BTreeMap<BlockHash, u64> = BTreeMap::new();
        for log in logs.iter().filter(|log| log.block_timestamp == 0) {
            if !timestamps.contains_key(&log.block_hash) {
                let header = self.header_by_hash(cancel, log.block_hash).await?;
                timestamps.insert(log.block_hash, header.timestamp);
            }
        }
        for log in logs.iter_mut() {
            if let Some(ts) = timestamps.get(&log.block_hash) {
                log.block_timestamp = *ts;
            }
        }
        Ok(logs)
    }

    pub(super) async fn header_by_number(&self, cancel: &CancellationToken, number: u64) -> Result<Block> {
        self.chain_call(cancel, "header_by_number", || self.client.header_by_number(BlockTag::Number(number))).await
    }

    async fn header_by_hash(&self, cancel: &CancellationToken, hash: BlockHash) -> Result<Block> {
        self.chain_call(cancel, "header_by_hash", || async move { self.client.header_by_hash(&hash).await }).await
    }

    /// Retries transient failures and aborts as soon as `cancel` fires.
    async fn chain_call<T, F, Fut>(&self, cancel: &CancellationToken, operation: &str, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        tokio::select! {
            _ = cancel.cancelled() => Err(NodeError::Cancelled),
            result = retry(operation, self.options.rpc_retry_attempts, self.options.rpc_retry_delay, op) => result,
        }
    }
}

pub(super) fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(NodeError::Cancelled);
    }
    Ok(())
}

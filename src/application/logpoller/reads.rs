use super::LogPoller;
use crate::domain::logpoller::{Confirmations, Log, StoredBlock};
use crate::foundation::{Address, EventSig, NodeError, Result};

impl LogPoller {
    /// Highest stored block. `NoRows` before the first successful cycle.
    pub fn latest_block(&self) -> Result<StoredBlock> {
        self.orm.select_latest_block()?.ok_or(NodeError::NoRows)
    }

    pub fn block_by_number(&self, number: u64) -> Result<StoredBlock> {
        self.orm.select_block_by_number(number)?.ok_or(NodeError::NoRows)
    }

    /// Logs emitted by `address` with topic0 `event_sig` in `[start, end]`.
    pub fn logs(&self, start: u64, end: u64, address: &Address, event_sig: &EventSig) -> Result<Vec<Log>> {
        self.orm.select_logs(start, end, address, event_sig)
    }

    pub fn logs_with_sigs(&self, start: u64, end: u64, event_sigs: &[EventSig], address: &Address) -> Result<Vec<Log>> {
        if event_sigs.is_empty() {
            return Ok(Vec::new());
        }
        self.orm.select_logs_with_sigs(start, end, address, event_sigs)
    }

    /// Most recent matching log that satisfies `confirmations`. `NoRows` when there is none.
    pub fn latest_log_by_event_sig(&self, event_sig: &EventSig, address: &Address, confirmations: Confirmations) -> Result<Log> {
        let max_block = self.confirmed_block_bound(confirmations)?;
        self.orm.select_latest_log_by_event_sig(address, event_sig, max_block)?.ok_or(NodeError::NoRows)
    }

    /// Highest block number a read with `confirmations` may return.
    fn confirmed_block_bound(&self, confirmations: Confirmations) -> Result<u64> {
        match confirmations {
            Confirmations::Finalized => Ok(self.orm.select_latest_finalized_block()?.ok_or(NodeError::NoRows)?.number),
            Confirmations::Depth(depth) => self.latest_block()?.number.checked_sub(depth).ok_or(NodeError::NoRows),
        }
    }
}

use super::cycle::check_cancelled;
use super::{FinalityViolation, LogPoller};
use crate::domain::logpoller::StoredBlock;
use crate::foundation::{NodeError, Result};
use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

impl LogPoller {
    /// Re-validates and re-fetches everything from `from_block` on, then runs a normal cycle.
    ///
    /// Stored blocks at or above `from_block` are compared with the chain; the first mismatch
    /// deletes the stored suffix from that block. Logs for the still-canonical range are fetched
    /// again and upserted. Mutually exclusive with regular cycles.
    pub async fn replay(&self, cancel: &CancellationToken, from_block: u64) -> Result<()> {
        let _guard = tokio::select! {
            _ = cancel.cancelled() => return Err(NodeError::Cancelled),
            guard = self.poll_lock.lock() => guard,
        };
        let result = self.replay_locked(cancel, from_block).await;
        self.reset_phase();
        if let Err(err) = &result {
            warn!("replay failed chain_id={} from={} error={}", self.chain_id, from_block, err);
        }
        result
    }

    async fn replay_locked(&self, cancel: &CancellationToken, from_block: u64) -> Result<()> {
        let Some(latest) = self.orm.select_latest_block()? else {
            info!("replay on empty store chain_id={} from={}", self.chain_id, from_block);
            return self.run_cycle(cancel, from_block).await;
        };
        if from_block > latest.number + 1 {
            return Err(NodeError::ReplayOutOfRange { from: from_block, latest: latest.number });
        }
        info!("replay start chain_id={} from={} latest_stored={}", self.chain_id, from_block, latest.number);

        let canonical_to = self.revalidate(cancel, from_block, latest.number).await?;
        if let Some(to) = canonical_to.filter(|to| *to >= from_block) {
            let (_, finalized) = self.heads(cancel).await?;
            self.backfill(cancel, from_block, to, finalized.number).await?;
        }
        let next = self.orm.select_latest_block()?.map(|block| block.number + 1).unwrap_or(from_block);
        self.run_cycle(cancel, next).await?;
        info!("replay complete chain_id={} from={}", self.chain_id, from_block);
        Ok(())
    }

    /// Highest stored block in `[from, to]` that is still canonical, after deleting the first
    /// diverging block and everything above it. `None` when nothing in the range survives.
    /// A diverging finalized block is a `FinalityViolation` and nothing is deleted.
    async fn revalidate(&self, cancel: &CancellationToken, from: u64, to: u64) -> Result<Option<u64>> {
        let stored: Vec<StoredBlock> = self.orm.select_blocks_range(from, to)?;
        let finalized = self.orm.select_latest_finalized_block()?.map(|block| block.number);
        let (chain_latest, _) = self.heads(cancel).await?;
        let mut canonical_to = from.checked_sub(1);
        for block in stored {
            check_cancelled(cancel)?;
            if block.number > chain_latest.number {
                // the regular cycle checks these once the chain head reaches them
                debug!("replay stops at chain head chain_id={} head={} stored={}", self.chain_id, chain_latest.number, block.number);
                break;
            }
            if self.header_by_number(cancel, block.number).await?.hash != block.hash {
                warn!("replay found non-canonical block chain_id={} block={} hash={}", self.chain_id, block.number, block.hash);
                if let Some(finalized) = finalized.filter(|f| block.number <= *f) {
                    *self.finality_violation.lock() = Some(FinalityViolation { block: block.number, finalized });
                    return Err(NodeError::FinalityViolation { block: block.number, finalized });
                }
                self.orm.delete_logs_and_blocks_after(block.number)?;
                return Ok(block.number.checked_sub(1).filter(|n| *n >= from));
            }
            canonical_to = Some(block.number);
        }
        Ok(canonical_to)
    }
}

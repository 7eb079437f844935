use super::LogPoller;
use crate::domain::logpoller::Block;
use log::{debug, info, trace, warn};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

impl LogPoller {
    /// Polls on every tick (and on every new head when the client streams them) until `cancel` fires.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.options.poll_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let prune_enabled = self.options.keep_finalized_blocks_depth > 0;
        let mut prune_ticker = tokio::time::interval(self.options.prune_period);
        prune_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut heads = match self.client.subscribe_new_heads().await {
            Ok(heads) => heads,
            Err(err) => {
                warn!("head subscription unavailable, polling on ticker only chain_id={} error={}", self.chain_id, err);
                None
            }
        };

        info!(
            "log poller started chain_id={} poll_period_ms={} head_subscription={} prune_enabled={}",
            self.chain_id,
            self.options.poll_period.as_millis(),
            heads.is_some(),
            prune_enabled
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.poll(&cancel).await,
                _ = prune_ticker.tick(), if prune_enabled => {
                    self.prune(&cancel).await;
                }
                head = next_head(&mut heads) => match head {
                    Some(head) => {
                        trace!("new head chain_id={} number={}", self.chain_id, head.number);
                        self.poll(&cancel).await;
                    }
                    None => {
                        debug!("head subscription closed chain_id={}", self.chain_id);
                        heads = None;
                    }
                },
            }
        }
        info!("log poller stopped chain_id={}", self.chain_id);
    }

    /// Deletes finalized blocks older than `keep_finalized_blocks_depth`. Logs are kept.
    pub async fn prune(&self, cancel: &CancellationToken) {
        let _guard = tokio::select! {
            _ = cancel.cancelled() => return,
            guard = self.poll_lock.lock() => guard,
        };
        match self.prune_old_blocks() {
            Ok(0) => {}
            Ok(removed) => info!("pruned old blocks chain_id={} removed={}", self.chain_id, removed),
            Err(err) => warn!("prune failed chain_id={} error={}", self.chain_id, err),
        }
    }

    fn prune_old_blocks(&self) -> crate::foundation::Result<usize> {
        let depth = self.options.keep_finalized_blocks_depth;
        if depth == 0 {
            return Ok(0);
        }
        let Some(finalized) = self.orm.select_latest_finalized_block()? else {
            return Ok(0);
        };
        let cutoff = finalized.number.saturating_sub(depth);
        if cutoff == 0 {
            return Ok(0);
        }
        self.orm.delete_blocks_before(cutoff)
    }

    /// Spawns [`LogPoller::run`] on the current runtime.
    pub fn start(self: &Arc<Self>) -> LogPollerTask {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(Arc::clone(self).run(cancel.clone()));
        LogPollerTask { cancel, handle: Some(handle) }
    }
}

async fn next_head(heads: &mut Option<mpsc::Receiver<Block>>) -> Option<Block> {
    match heads {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Background poller. Dropping the task aborts it; [`LogPollerTask::stop`] lets an in-flight
/// cycle observe cancellation first.
pub struct LogPollerTask {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl LogPollerTask {
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                if !err.is_cancelled() {
                    warn!("log poller task ended abnormally error={}", err);
                }
            }
        }
    }
}

impl Drop for LogPollerTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.cancel.cancel();
            handle.abort();
        }
    }
}

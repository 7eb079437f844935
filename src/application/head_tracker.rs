//! Latest and finalized chain heads as seen by the log poller.

use crate::domain::logpoller::{Block, BlockTag};
use crate::foundation::{NodeError, Result};
use crate::infrastructure::rpc::ChainClient;
use async_trait::async_trait;
use log::trace;
use std::sync::Arc;

/// How the finalized head is derived.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FinalityMode {
    /// The node's `finalized` block tag.
    Tag,
    /// `latest - depth`, floored at genesis.
    Depth(u64),
}

#[async_trait]
pub trait HeadTracker: Send + Sync {
    /// Returns `(latest, finalized)`. `finalized.number <= latest.number` always holds.
    async fn latest_and_finalized(&self) -> Result<(Block, Block)>;
}

pub struct ChainHeadTracker {
    client: Arc<dyn ChainClient>,
    finality: FinalityMode,
}

impl ChainHeadTracker {
    pub fn new(client: Arc<dyn ChainClient>, finality: FinalityMode) -> Self {
        Self { client, finality }
    }

    pub fn finality(&self) -> FinalityMode {
        self.finality
    }
}

#[async_trait]
impl HeadTracker for ChainHeadTracker {
    async fn latest_and_finalized(&self) -> Result<(Block, Block)> {
        let latest = self.client.header_by_number(BlockTag::Latest).await?;
        let finalized = match self.finality {
            FinalityMode::Tag => self.client.header_by_number(BlockTag::Finalized).await?,
            FinalityMode::Depth(depth) => self.client.header_by_number(BlockTag::Number(latest.number.saturating_sub(depth))).await?,
        };
        // Load-balanced endpoints can answer the two calls from nodes at different heights.
        if finalized.number > latest.number {
            return Err(NodeError::chain_transient(
                "latest_and_finalized",
                format!("finalized head {} is ahead of latest {}", finalized.number, latest.number),
            ));
        }
        trace!("heads chain_id={} latest={} finalized={}", self.client.chain_id(), latest.number, finalized.number);
        Ok((latest, finalized))
    }
}

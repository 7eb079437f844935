//! In-process chain used by tests and local runs.
//!
//! Block hashes are derived from the parent hash, the height and a fork epoch, so re-mining a
//! height after [`SimulatedChainClient::fork_at`] always produces a different hash. Orphaned
//! blocks stay reachable by hash, as they do on a real node shortly after a reorg.

use super::ChainClient;
use crate::domain::logpoller::{Block, BlockTag, Log, LogQuery, LogRange};
use crate::foundation::{Address, BlockHash, ChainId, NodeError, Result, Topic, TxHash};
use async_trait::async_trait;
use log::{debug, trace};
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::mpsc;

const GENESIS_TIMESTAMP: u64 = 1_700_000_000;
const BLOCK_TIME_SECS: u64 = 12;
const HEAD_CHANNEL_CAPACITY: usize = 64;

/// A log to be emitted by the next mined block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimulatedLog {
    pub address: Address,
    pub topics: Vec<Topic>,
    pub data: Vec<u8>,
}

impl SimulatedLog {
    pub fn new(address: Address, topics: Vec<Topic>, data: Vec<u8>) -> Self {
        Self { address, topics, data }
    }
}

struct SimState {
    canonical: Vec<Block>,
    blocks_by_hash: HashMap<BlockHash, Block>,
    logs_by_hash: HashMap<BlockHash, Vec<Log>>,
    epoch: u64,
    finalized: u64,
    fail_next: usize,
    log_requests: usize,
    subscribers: Vec<mpsc::Sender<Block>>,
}

impl SimState {
    fn latest(&self) -> &Block {
        // canonical always holds genesis
        &self.canonical[self.canonical.len() - 1]
    }

    fn take_failure(&mut self, operation: &str) -> Result<()> {
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(NodeError::chain_transient(operation, "injected failure"));
        }
        Ok(())
    }
}

pub struct SimulatedChainClient {
    chain_id: ChainId,
    state: Mutex<SimState>,
}

impl SimulatedChainClient {
    /// A chain holding only the genesis block (number 0, finalized).
    pub fn new(chain_id: ChainId) -> Self {
        let genesis = Block {
            number: 0,
            hash: block_hash(chain_id, 0, &BlockHash::zero(), 0),
            parent_hash: BlockHash::zero(),
            timestamp: GENESIS_TIMESTAMP,
        };
        let mut blocks_by_hash = HashMap::new();
        blocks_by_hash.insert(genesis.hash, genesis.clone());
        let mut logs_by_hash = HashMap::new();
        logs_by_hash.insert(genesis.hash, Vec::new());
        Self {
            chain_id,
            state: Mutex::new(SimState {
                canonical: vec![genesis],
                blocks_by_hash,
                logs_by_hash,
                epoch: 0,
                finalized: 0,
                fail_next: 0,
                log_requests: 0,
                subscribers: Vec::new(),
            }),
        }
    }

    /// Appends one block carrying `logs` to the canonical chain.
    pub fn mine_block(&self, logs: Vec<SimulatedLog>) -> Block {
        let mut state = self.state.lock();
        let parent = state.latest().clone();
        let number = parent.number + 1;
        let block = Block {
            number,
            hash: block_hash(self.chain_id, state.epoch, &parent.hash, number),
            parent_hash: parent.hash,
            timestamp: parent.timestamp + BLOCK_TIME_SECS,
        };
        let logs = logs
            .into_iter()
            .enumerate()
            .map(|(index, log)| Log {
                block_number: number,
                block_hash: block.hash,
                block_timestamp: 0,
                tx_hash: tx_hash(&block.hash, index as u64),
                log_index: index as u64,
                address: log.address,
                topics: log.topics,
                data: log.data,
            })
            .collect();
        trace!("simulated chain mined chain_id={} number={} hash={}", self.chain_id, number, block.hash);
        state.blocks_by_hash.insert(block.hash, block.clone());
        state.logs_by_hash.insert(block.hash, logs);
        state.canonical.push(block.clone());
        state.subscribers.retain(|tx| !tx.is_closed());
        for tx in &state.subscribers {
            // a full channel drops the notification; the poll ticker still catches up
            let _ = tx.try_send(block.clone());
        }
        block
    }

    /// Mines `count` empty blocks and returns the new head.
    pub fn mine_blocks(&self, count: u64) -> Block {
        let mut head = self.latest();
        for _ in 0..count {
            head = self.mine_block(Vec::new());
        }
        head
    }

    /// Drops canonical blocks at or above `number` so the next mined blocks fork from `number - 1`.
    ///
    /// Genesis is never dropped. The finalized head is left untouched, so forking at or below it
    /// simulates a reorg deeper than finality.
    pub fn fork_at(&self, number: u64) {
        let mut state = self.state.lock();
        let keep = number.max(1) as usize;
        if keep < state.canonical.len() {
            state.canonical.truncate(keep);
        }
        state.epoch += 1;
        debug!("simulated chain fork chain_id={} at={} epoch={}", self.chain_id, number, state.epoch);
    }

    /// Marks blocks up to `number` (capped at the head) as finalized.
    pub fn finalize(&self, number: u64) {
        let mut state = self.state.lock();
        state.finalized = number.min(state.latest().number);
    }

    /// The next `count` requests fail with a transient error.
    pub fn fail_next_requests(&self, count: usize) {
        self.state.lock().fail_next = count;
    }

    /// `filter_logs` calls served so far, failed ones included.
    pub fn log_requests(&self) -> usize {
        self.state.lock().log_requests
    }

    pub fn latest(&self) -> Block {
        self.state.lock().latest().clone()
    }

    pub fn finalized(&self) -> u64 {
        self.state.lock().finalized
    }

    /// Canonical block at `number`.
    pub fn block(&self, number: u64) -> Option<Block> {
        self.state.lock().canonical.get(number as usize).cloned()
    }

    /// Logs of the canonical block at `number`.
    pub fn logs_at(&self, number: u64) -> Vec<Log> {
        let state = self.state.lock();
        state.canonical.get(number as usize).and_then(|block| state.logs_by_hash.get(&block.hash)).cloned().unwrap_or_default()
    }
}

fn block_hash(chain_id: ChainId, epoch: u64, parent: &BlockHash, number: u64) -> BlockHash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"simulated-block");
    hasher.update(&chain_id.to_be_bytes());
    hasher.update(&epoch.to_be_bytes());
    hasher.update(parent.as_bytes());
    hasher.update(&number.to_be_bytes());
    BlockHash::new(*hasher.finalize().as_bytes())
}

fn tx_hash(block: &BlockHash, index: u64) -> TxHash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"simulated-tx");
    hasher.update(block.as_bytes());
    hasher.update(&index.to_be_bytes());
    TxHash::new(*hasher.finalize().as_bytes())
}

#[async_trait]
impl ChainClient for SimulatedChainClient {
    fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    async fn header_by_number(&self, tag: BlockTag) -> Result<Block> {
        let mut state = self.state.lock();
        state.take_failure("header_by_number")?;
        let number = match tag {
            BlockTag::Latest => state.latest().number,
            BlockTag::Finalized => state.finalized,
            BlockTag::Number(n) => n,
        };
        state
            .canonical
            .get(number as usize)
            .cloned()
            .ok_or_else(|| NodeError::chain_transient("header_by_number", format!("block {} not found", number)))
    }

    async fn header_by_hash(&self, hash: &BlockHash) -> Result<Block> {
        let mut state = self.state.lock();
        state.take_failure("header_by_hash")?;
        state
            .blocks_by_hash
            .get(hash)
            .cloned()
            .ok_or_else(|| NodeError::chain_transient("header_by_hash", format!("block {} not found", hash)))
    }

    async fn filter_logs(&self, query: &LogQuery) -> Result<Vec<Log>> {
        let mut state = self.state.lock();
        state.log_requests += 1;
        state.take_failure("filter_logs")?;
        let logs: Vec<Log> = match query.range {
            LogRange::Blocks { from, to } => state
                .canonical
                .iter()
                .filter(|block| block.number >= from && block.number <= to)
                .filter_map(|block| state.logs_by_hash.get(&block.hash))
                .flatten()
                .filter(|log| query.matches(log))
                .cloned()
                .collect(),
            LogRange::BlockHash(hash) => {
                let logs = state
                    .logs_by_hash
                    .get(&hash)
                    .ok_or_else(|| NodeError::chain_transient("filter_logs", format!("block {} not found", hash)))?;
                logs.iter().filter(|log| query.matches(log)).cloned().collect()
            }
        };
        Ok(logs)
    }

    async fn subscribe_new_heads(&self) -> Result<Option<mpsc::Receiver<Block>>> {
        let (tx, rx) = mpsc::channel(HEAD_CHANNEL_CAPACITY);
        self.state.lock().subscribers.push(tx);
        Ok(Some(rx))
    }
}

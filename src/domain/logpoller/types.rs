use crate::foundation::{Address, BlockHash, ChainId, EventSig, Topic, TxHash};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Block header as reported by the chain client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub number: u64,
    pub hash: BlockHash,
    pub parent_hash: BlockHash,
    pub timestamp: u64,
}

/// Block header persisted by the poller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredBlock {
    pub chain_id: ChainId,
    pub number: u64,
    pub hash: BlockHash,
    pub parent_hash: BlockHash,
    pub timestamp: u64,
    /// True when the block was at or below the finalized head at insert time.
    pub finalized: bool,
    /// Finalized head number observed when this block was inserted.
    pub finalized_block_number: u64,
}

impl StoredBlock {
    pub fn from_block(chain_id: ChainId, block: &Block, finalized_block_number: u64) -> Self {
        Self {
            chain_id,
            number: block.number,
            hash: block.hash,
            parent_hash: block.parent_hash,
            timestamp: block.timestamp,
            finalized: block.number <= finalized_block_number,
            finalized_block_number,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    pub block_number: u64,
    pub block_hash: BlockHash,
    pub block_timestamp: u64,
    pub tx_hash: TxHash,
    pub log_index: u64,
    pub address: Address,
    pub topics: Vec<Topic>,
    pub data: Vec<u8>,
}

impl Log {
    pub fn event_sig(&self) -> Option<&EventSig> {
        self.topics.first()
    }
}

/// Named interest in events emitted by a set of contracts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub name: String,
    pub addresses: BTreeSet<Address>,
    pub event_sigs: BTreeSet<EventSig>,
}

impl Filter {
    pub fn new(name: impl Into<String>, addresses: impl IntoIterator<Item = Address>, event_sigs: impl IntoIterator<Item = EventSig>) -> Self {
        Self { name: name.into(), addresses: addresses.into_iter().collect(), event_sigs: event_sigs.into_iter().collect() }
    }

    pub fn matches(&self, log: &Log) -> bool {
        self.addresses.contains(&log.address) && log.event_sig().map(|sig| self.event_sigs.contains(sig)).unwrap_or(false)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogRange {
    Blocks { from: u64, to: u64 },
    BlockHash(BlockHash),
}

/// `eth_getLogs`-shaped query. Empty `addresses` / `event_sigs` mean "any".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogQuery {
    pub range: LogRange,
    pub addresses: Vec<Address>,
    pub event_sigs: Vec<EventSig>,
}

impl LogQuery {
    pub fn matches(&self, log: &Log) -> bool {
        let address_ok = self.addresses.is_empty() || self.addresses.contains(&log.address);
        let sig_ok = self.event_sigs.is_empty() || log.event_sig().map(|sig| self.event_sigs.contains(sig)).unwrap_or(false);
        address_ok && sig_ok
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockTag {
    Latest,
    Finalized,
    Number(u64),
}

/// How settled a log must be before reads return it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Confirmations {
    Finalized,
    /// At least this many blocks below the latest stored block. `Depth(0)` returns everything stored.
    Depth(u64),
}

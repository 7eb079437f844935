#![allow(dead_code)]

use crate::fixtures::{TEST_EMITTER, TEST_EVENT};
use oracle_node_core::application::{ChainHeadTracker, FinalityMode, LogPoller, LogPollerOptions};
use oracle_node_core::domain::logpoller::Filter;
use oracle_node_core::foundation::{EventSig, Topic};
use oracle_node_core::infrastructure::keys::{Argon2Params, KeyManager, KeyRingStore, Keystore};
use oracle_node_core::infrastructure::rpc::{ChainClient, SimulatedChainClient, SimulatedLog};
use oracle_node_core::infrastructure::storage::LogPollerOrm;
use std::sync::Arc;
use std::time::Duration;

/// Keystore with cheap KDF parameters over `store`. Still locked.
pub fn fast_keystore(store: Arc<dyn KeyRingStore>) -> Keystore {
    Keystore::new(KeyManager::new(store).with_kdf_params(Argon2Params::fast()))
}

pub fn event_sig() -> EventSig {
    Topic::from_event_signature(TEST_EVENT)
}

pub fn emitter_filter() -> Filter {
    Filter::new("emitter", [TEST_EMITTER], [event_sig()])
}

/// Mines `count` blocks, each with one matching log carrying `tag` as data.
pub fn mine_tagged(chain: &SimulatedChainClient, count: u64, tag: u8) {
    for _ in 0..count {
        chain.mine_block(vec![SimulatedLog::new(TEST_EMITTER, vec![event_sig()], vec![tag])]);
    }
}

pub fn test_options(start_block: Option<u64>) -> LogPollerOptions {
    LogPollerOptions {
        poll_period: Duration::from_millis(20),
        start_block,
        backfill_batch_size: 4,
        rpc_retry_attempts: 1,
        rpc_retry_delay: Duration::from_millis(1),
        ..LogPollerOptions::default()
    }
}

/// Poller with the emitter filter registered and depth-based finality.
pub fn build_poller(client: Arc<dyn ChainClient>, orm: Arc<dyn LogPollerOrm>, finality_depth: u64, start_block: Option<u64>) -> LogPoller {
    let tracker = Arc::new(ChainHeadTracker::new(Arc::clone(&client), FinalityMode::Depth(finality_depth)));
    let poller = LogPoller::new(client, tracker, orm, test_options(start_block)).expect("poller");
    poller.register_filter(emitter_filter()).expect("register filter");
    poller
}

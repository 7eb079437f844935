use crate::fixtures::{build_poller, event_sig, mine_tagged, TEST_CHAIN_ID, TEST_EMITTER};
use oracle_node_core::domain::logpoller::Confirmations;
use oracle_node_core::foundation::NodeError;
use oracle_node_core::infrastructure::rpc::SimulatedChainClient;
use oracle_node_core::infrastructure::storage::{LogPollerOrm, RocksStorage};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn assert_matches_chain(orm: &dyn LogPollerOrm, chain: &SimulatedChainClient, from: u64, to: u64) {
    for number in from..=to {
        let stored = orm.select_block_by_number(number).expect("select").expect("stored block");
        assert_eq!(stored.hash, chain.block(number).expect("chain block").hash, "block {}", number);
    }
}

#[tokio::test]
async fn fork_replaces_orphaned_suffix_in_rocksdb() -> Result<(), NodeError> {
    let temp_dir = TempDir::new().expect("temp dir");
    let storage = Arc::new(RocksStorage::open_in_dir(temp_dir.path())?);
    let orm = Arc::new(storage.log_poller_orm(TEST_CHAIN_ID));
    let chain = Arc::new(SimulatedChainClient::new(TEST_CHAIN_ID));
    let poller = build_poller(chain.clone(), orm.clone(), 5, Some(1));
    let cancel = CancellationToken::new();

    mine_tagged(&chain, 10, 1);
    poller.poll(&cancel).await;
    assert_matches_chain(orm.as_ref(), &chain, 5, 10);
    let orphaned: Vec<_> = (7..=10).map(|n| poller.block_by_number(n).map(|b| b.hash)).collect::<Result<_, _>>()?;

    chain.fork_at(7);
    mine_tagged(&chain, 4, 2);
    poller.poll(&cancel).await;

    assert_matches_chain(orm.as_ref(), &chain, 6, 10);
    let logs = poller.logs(1, 10, &TEST_EMITTER, &event_sig())?;
    assert_eq!(logs.len(), 10);
    assert!(logs.iter().all(|log| !orphaned.contains(&log.block_hash)));
    assert_eq!(logs.iter().filter(|log| log.data == vec![2]).count(), 4);
    assert!(poller.healthy().is_ok());

    let finalized = poller.latest_log_by_event_sig(&event_sig(), &TEST_EMITTER, Confirmations::Finalized)?;
    assert_eq!(finalized.data, vec![1]);
    Ok(())
}

#[tokio::test]
async fn restart_resumes_after_stored_tip() -> Result<(), NodeError> {
    let temp_dir = TempDir::new().expect("temp dir");
    let chain = Arc::new(SimulatedChainClient::new(TEST_CHAIN_ID));
    mine_tagged(&chain, 6, 1);
    {
        let storage = Arc::new(RocksStorage::open_in_dir(temp_dir.path())?);
        let poller = build_poller(chain.clone(), Arc::new(storage.log_poller_orm(TEST_CHAIN_ID)), 2, Some(1));
        poller.poll(&CancellationToken::new()).await;
        assert_eq!(poller.latest_block()?.number, 6);
    }

    mine_tagged(&chain, 3, 2);
    let storage = Arc::new(RocksStorage::open_in_dir(temp_dir.path())?);
    let orm = Arc::new(storage.log_poller_orm(TEST_CHAIN_ID));
    let poller = build_poller(chain.clone(), orm.clone(), 2, Some(1));
    assert_eq!(poller.filters().len(), 1);
    poller.poll(&CancellationToken::new()).await;

    assert_eq!(poller.latest_block()?.number, 9);
    assert_matches_chain(orm.as_ref(), &chain, 6, 9);
    assert_eq!(poller.logs(1, 9, &TEST_EMITTER, &event_sig())?.len(), 9);
    Ok(())
}

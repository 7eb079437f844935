use crate::fixtures::{build_poller, event_sig, mine_tagged, TEST_CHAIN_ID, TEST_EMITTER};
use oracle_node_core::infrastructure::rpc::{ChainClient, CircuitBreakerConfig, FailoverChainClient, SimulatedChainClient};
use oracle_node_core::infrastructure::storage::MemoryStorage;
use oracle_node_core::NodeError;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn mine_on_both(a: &SimulatedChainClient, b: &SimulatedChainClient, count: u64, tag: u8) {
    mine_tagged(a, count, tag);
    mine_tagged(b, count, tag);
}

#[tokio::test]
async fn endpoint_swap_during_polling_keeps_store_consistent() -> Result<(), NodeError> {
    let primary = Arc::new(SimulatedChainClient::new(TEST_CHAIN_ID));
    let backup = Arc::new(SimulatedChainClient::new(TEST_CHAIN_ID));
    let clients: Vec<Arc<dyn ChainClient>> = vec![primary.clone(), backup.clone()];
    let breaker = CircuitBreakerConfig { failure_threshold: 1_000, ..CircuitBreakerConfig::default() };
    let failover = Arc::new(FailoverChainClient::new(clients, breaker)?);
    let poller = build_poller(failover.clone(), Arc::new(MemoryStorage::new(TEST_CHAIN_ID)), 2, Some(1));
    let cancel = CancellationToken::new();

    mine_on_both(&primary, &backup, 5, 1);
    primary.fail_next_requests(1_000);
    poller.poll(&cancel).await;
    assert_eq!(poller.latest_block()?.number, 5);
    assert_eq!(failover.active_index(), 1);

    primary.fail_next_requests(0);
    mine_on_both(&primary, &backup, 3, 2);
    failover.set_active(0)?;
    poller.poll(&cancel).await;

    assert_eq!(failover.active_index(), 0);
    assert_eq!(poller.latest_block()?.hash, primary.latest().hash);
    assert_eq!(poller.logs(1, 8, &TEST_EMITTER, &event_sig())?.len(), 8);
    assert!(poller.healthy().is_ok());
    Ok(())
}

#[tokio::test]
async fn all_endpoints_failing_leaves_store_untouched() -> Result<(), NodeError> {
    let primary = Arc::new(SimulatedChainClient::new(TEST_CHAIN_ID));
    let backup = Arc::new(SimulatedChainClient::new(TEST_CHAIN_ID));
    let clients: Vec<Arc<dyn ChainClient>> = vec![primary.clone(), backup.clone()];
    let failover = Arc::new(FailoverChainClient::new(clients, CircuitBreakerConfig::default())?);
    let poller = build_poller(failover, Arc::new(MemoryStorage::new(TEST_CHAIN_ID)), 2, Some(1));

    mine_on_both(&primary, &backup, 4, 1);
    primary.fail_next_requests(100);
    backup.fail_next_requests(100);
    poller.poll(&CancellationToken::new()).await;

    assert!(matches!(poller.latest_block(), Err(NodeError::NoRows)));
    Ok(())
}

use crate::fixtures::{event_sig, emitter_filter, TEST_EMITTER};
use oracle_node_core::domain::logpoller::{Block, Log, StoredBlock};
use oracle_node_core::foundation::{BlockHash, NodeError, TxHash};
use oracle_node_core::infrastructure::storage::{LogPollerOrm, RocksStorage};
use std::sync::Arc;
use tempfile::TempDir;

fn block(chain_id: u64, number: u64, finalized: u64) -> StoredBlock {
    let header = Block {
        number,
        hash: BlockHash::new([number as u8 + 1; 32]),
        parent_hash: BlockHash::new([number as u8; 32]),
        timestamp: 1_700_000_000 + number,
    };
    StoredBlock::from_block(chain_id, &header, finalized)
}

fn log(number: u64, index: u64) -> Log {
    Log {
        block_number: number,
        block_hash: BlockHash::new([number as u8 + 1; 32]),
        block_timestamp: 1_700_000_000 + number,
        tx_hash: TxHash::new([0xAA; 32]),
        log_index: index,
        address: TEST_EMITTER,
        topics: vec![event_sig()],
        data: vec![number as u8, index as u8],
    }
}

fn fill(orm: &dyn LogPollerOrm, chain_id: u64, to: u64, finalized: u64) -> Result<(), NodeError> {
    for number in 1..=to {
        orm.insert_logs_with_block(&[log(number, 0), log(number, 1)], &block(chain_id, number, finalized))?;
    }
    Ok(())
}

#[test]
fn chains_are_isolated_in_one_database() -> Result<(), NodeError> {
    let temp_dir = TempDir::new().expect("temp dir");
    let storage = Arc::new(RocksStorage::open_in_dir(temp_dir.path())?);
    let one = storage.log_poller_orm(1);
    let two = storage.log_poller_orm(2);

    fill(&one, 1, 5, 2)?;
    fill(&two, 2, 3, 1)?;
    one.delete_logs_and_blocks_after(1)?;

    assert!(one.select_latest_block()?.is_none());
    assert_eq!(two.select_latest_block()?.map(|b| b.number), Some(3));
    assert_eq!(two.select_logs(1, 3, &TEST_EMITTER, &event_sig())?.len(), 6);
    Ok(())
}

#[test]
fn reorg_delete_is_inclusive_and_removes_blocks_with_logs() -> Result<(), NodeError> {
    let temp_dir = TempDir::new().expect("temp dir");
    let storage = Arc::new(RocksStorage::open_in_dir(temp_dir.path())?);
    let orm = storage.log_poller_orm(1);
    fill(&orm, 1, 10, 4)?;

    orm.delete_logs_and_blocks_after(7)?;

    assert_eq!(orm.select_latest_block()?.map(|b| b.number), Some(6));
    let logs = orm.select_logs(1, 10, &TEST_EMITTER, &event_sig())?;
    assert_eq!(logs.last().map(|l| (l.block_number, l.log_index)), Some((6, 1)));
    assert_eq!(orm.select_latest_finalized_block()?.map(|b| b.number), Some(4));
    Ok(())
}

#[test]
fn logs_are_ordered_and_upserted() -> Result<(), NodeError> {
    let temp_dir = TempDir::new().expect("temp dir");
    let storage = Arc::new(RocksStorage::open_in_dir(temp_dir.path())?);
    let orm = storage.log_poller_orm(1);
    orm.insert_logs(&[log(3, 1), log(2, 0), log(3, 0)])?;
    let mut replaced = log(3, 0);
    replaced.data = vec![0xFF];
    orm.insert_logs(&[replaced])?;

    let logs = orm.select_logs(1, 5, &TEST_EMITTER, &event_sig())?;
    let keys: Vec<_> = logs.iter().map(|l| (l.block_number, l.log_index)).collect();
    assert_eq!(keys, vec![(2, 0), (3, 0), (3, 1)]);
    assert_eq!(logs[1].data, vec![0xFF]);

    let latest = orm.select_latest_log_by_event_sig(&TEST_EMITTER, &event_sig(), 2)?.expect("latest");
    assert_eq!(latest.block_number, 2);
    Ok(())
}

#[test]
fn prune_keeps_latest_block_and_all_logs() -> Result<(), NodeError> {
    let temp_dir = TempDir::new().expect("temp dir");
    let storage = Arc::new(RocksStorage::open_in_dir(temp_dir.path())?);
    let orm = storage.log_poller_orm(1);
    fill(&orm, 1, 5, 5)?;

    let removed = orm.delete_blocks_before(100)?;

    assert_eq!(removed, 4);
    assert_eq!(orm.select_latest_block()?.map(|b| b.number), Some(5));
    assert_eq!(orm.select_logs(1, 5, &TEST_EMITTER, &event_sig())?.len(), 10);
    Ok(())
}

#[test]
fn filters_and_blocks_survive_reopen() -> Result<(), NodeError> {
    let temp_dir = TempDir::new().expect("temp dir");
    {
        let storage = Arc::new(RocksStorage::open_in_dir(temp_dir.path())?);
        let orm = storage.log_poller_orm(9);
        orm.insert_filter(&emitter_filter())?;
        fill(&orm, 9, 2, 1)?;
    }

    let storage = Arc::new(RocksStorage::open_in_dir(temp_dir.path())?);
    let orm = storage.log_poller_orm(9);
    let filters = orm.load_filters()?;
    assert_eq!(filters.get("emitter"), Some(&emitter_filter()));
    assert_eq!(orm.select_block_by_number(2)?.map(|b| b.hash), Some(BlockHash::new([3; 32])));
    orm.health_check()?;
    Ok(())
}

#[test]
fn range_reads_stop_at_the_end_block() -> Result<(), NodeError> {
    let temp_dir = TempDir::new().expect("temp dir");
    let storage = Arc::new(RocksStorage::open_in_dir(temp_dir.path())?);
    let orm = storage.log_poller_orm(1);
    let other_chain = storage.log_poller_orm(2);
    fill(&orm, 1, 12, 4)?;
    fill(&other_chain, 2, 12, 4)?;
    orm.insert_logs(&[log(6, u64::MAX - 1), log(7, 0)])?;

    let blocks = orm.select_blocks_range(3, 6)?;
    assert_eq!(blocks.iter().map(|b| b.number).collect::<Vec<_>>(), vec![3, 4, 5, 6]);

    let logs = orm.select_logs(3, 6, &TEST_EMITTER, &event_sig())?;
    assert_eq!(logs.len(), 9);
    assert_eq!(logs.last().map(|l| (l.block_number, l.log_index)), Some((6, u64::MAX - 1)));
    assert!(orm.select_blocks_range(6, 3)?.is_empty());

    assert_eq!(orm.delete_blocks_before(5)?, 4);
    assert_eq!(orm.select_blocks_range(1, 12)?.first().map(|b| b.number), Some(5));
    assert_eq!(other_chain.select_blocks_range(1, 12)?.len(), 12);
    Ok(())
}

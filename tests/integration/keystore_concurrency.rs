use crate::fixtures::{fast_keystore, TEST_PASSWORD};
use oracle_node_core::infrastructure::keys::{FileKeyRingStore, Keystore, MemoryKeyRingStore};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

fn run_concurrently(keystore: &Keystore, threads: usize, f: fn(&Keystore)) {
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let keystore = keystore.clone();
            thread::spawn(move || f(&keystore))
        })
        .collect();
    for handle in handles {
        handle.join().expect("join");
    }
}

#[test]
fn concurrent_ensure_key_leaves_exactly_one_key() {
    let keystore = fast_keystore(Arc::new(MemoryKeyRingStore::new()));
    keystore.unlock(TEST_PASSWORD).expect("unlock");

    run_concurrently(&keystore, 8, |keystore| {
        keystore.csa().ensure_key().expect("ensure csa");
        keystore.workflow().ensure_key().expect("ensure workflow");
    });

    assert_eq!(keystore.csa().get_all().expect("csa").len(), 1);
    assert_eq!(keystore.workflow().get_all().expect("workflow").len(), 1);
}

#[test]
fn concurrent_creates_are_all_persisted() {
    let temp_dir = TempDir::new().expect("temp dir");
    let keystore = fast_keystore(Arc::new(FileKeyRingStore::in_dir(temp_dir.path())));
    keystore.unlock(TEST_PASSWORD).expect("unlock");

    run_concurrently(&keystore, 6, |keystore| {
        keystore.p2p().create().expect("create p2p");
    });

    let reopened = fast_keystore(Arc::new(FileKeyRingStore::in_dir(temp_dir.path())));
    reopened.unlock(TEST_PASSWORD).expect("unlock");
    assert_eq!(reopened.p2p().get_all().expect("p2p").len(), 6);
}

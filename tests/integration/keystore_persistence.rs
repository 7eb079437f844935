use crate::fixtures::{fast_keystore, TEST_PASSWORD};
use oracle_node_core::domain::keys::TypedKey;
use oracle_node_core::foundation::NodeError;
use oracle_node_core::infrastructure::keys::FileKeyRingStore;
use oracle_node_core::infrastructure::storage::RocksStorage;
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn file_keystore_starts_locked_and_reopens_with_the_same_keys() {
    let temp_dir = TempDir::new().expect("temp dir");
    let keystore = fast_keystore(Arc::new(FileKeyRingStore::in_dir(temp_dir.path())));
    assert!(keystore.is_locked());
    assert!(matches!(keystore.csa().get_all(), Err(NodeError::Locked)));

    keystore.unlock(TEST_PASSWORD).expect("unlock");
    let csa = keystore.csa().create().expect("csa");
    let eth = keystore.eth().create().expect("eth");
    keystore.lock();
    drop(keystore);

    let reopened = fast_keystore(Arc::new(FileKeyRingStore::in_dir(temp_dir.path())));
    reopened.unlock(TEST_PASSWORD).expect("unlock again");
    let csa_again = reopened.csa().get(csa.id().as_str()).expect("csa key");
    assert_eq!(csa_again.public_key(), csa.public_key());
    let eth_again = reopened.eth().get(eth.id().as_str()).expect("eth key");
    assert_eq!(eth_again.address(), eth.address());
}

#[test]
fn wrong_password_is_decryption_failure_and_keeps_keystore_locked() {
    let temp_dir = TempDir::new().expect("temp dir");
    let store = Arc::new(FileKeyRingStore::in_dir(temp_dir.path()));
    let keystore = fast_keystore(store.clone());
    keystore.unlock(TEST_PASSWORD).expect("unlock");
    keystore.p2p().create().expect("p2p");

    let other = fast_keystore(store);
    let err = other.unlock("wrong password").expect_err("wrong password");
    assert!(matches!(err, NodeError::DecryptionFailed { .. }));
    assert!(other.is_locked());
}

#[cfg(target_family = "unix")]
#[test]
fn key_ring_file_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = TempDir::new().expect("temp dir");
    let store = FileKeyRingStore::in_dir(temp_dir.path());
    let path = store.path().to_path_buf();
    let keystore = fast_keystore(Arc::new(store));
    keystore.unlock(TEST_PASSWORD).expect("unlock");

    let mode = std::fs::metadata(&path).expect("metadata").permissions().mode() & 0o777;
    assert_eq!(mode, 0o600);
}

#[test]
fn rocks_backend_persists_the_key_ring() {
    let temp_dir = TempDir::new().expect("temp dir");
    let id = {
        let storage = Arc::new(RocksStorage::open_in_dir(temp_dir.path()).expect("open rocksdb"));
        let keystore = fast_keystore(storage);
        keystore.unlock(TEST_PASSWORD).expect("unlock");
        keystore.workflow().create().expect("workflow").id()
    };

    let storage = Arc::new(RocksStorage::open_in_dir(temp_dir.path()).expect("reopen rocksdb"));
    let keystore = fast_keystore(storage);
    keystore.unlock(TEST_PASSWORD).expect("unlock");
    let keys = keystore.workflow().get_all().expect("workflow keys");
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0].id(), id);
}

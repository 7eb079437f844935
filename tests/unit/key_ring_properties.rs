use crate::fixtures::{fast_keystore, TEST_EXPORT_PASSWORD, TEST_PASSWORD};
use oracle_node_core::domain::keys::{CsaKey, KeyKind, TypedKey, WorkflowKey};
use oracle_node_core::foundation::NodeError;
use oracle_node_core::infrastructure::keys::{Keystore, MemoryKeyRingStore};
use proptest::prelude::*;
use std::sync::Arc;
use std::thread;

#[derive(Clone, Copy, Debug)]
enum RingOp {
    CreateWorkflow,
    CreateCsa,
    AddWorkflow,
    AddCsa,
    EnsureCsa,
    DeleteWorkflow,
    CreateP2P,
}

fn ring_op() -> impl Strategy<Value = RingOp> {
    prop_oneof![
        Just(RingOp::CreateWorkflow),
        Just(RingOp::CreateCsa),
        Just(RingOp::AddWorkflow),
        Just(RingOp::AddCsa),
        Just(RingOp::EnsureCsa),
        Just(RingOp::DeleteWorkflow),
        Just(RingOp::CreateP2P),
    ]
}

/// Create and Add only; these are the ops that race on the singleton check.
fn racing_op() -> impl Strategy<Value = RingOp> {
    prop_oneof![Just(RingOp::CreateWorkflow), Just(RingOp::CreateCsa), Just(RingOp::AddWorkflow), Just(RingOp::AddCsa)]
}

/// Non-empty printable passwords.
fn password() -> impl Strategy<Value = String> {
    "\\PC{1,24}"
}

fn unlocked() -> Keystore {
    let keystore = fast_keystore(Arc::new(MemoryKeyRingStore::new()));
    keystore.unlock(TEST_PASSWORD).expect("unlock");
    keystore
}

fn count(keystore: &Keystore, kind: KeyKind) -> usize {
    match kind {
        KeyKind::Workflow => keystore.workflow().get_all().expect("workflow").len(),
        KeyKind::Csa => keystore.csa().get_all().expect("csa").len(),
        KeyKind::P2P => keystore.p2p().get_all().expect("p2p").len(),
        KeyKind::Eth => keystore.eth().get_all().expect("eth").len(),
    }
}

/// Applies `op`. Singleton rejections are expected outcomes and are ignored.
fn apply(keystore: &Keystore, op: RingOp) {
    match op {
        RingOp::CreateWorkflow => {
            let _ = keystore.workflow().create();
        }
        RingOp::CreateCsa => {
            let _ = keystore.csa().create();
        }
        RingOp::AddWorkflow => {
            let _ = keystore.workflow().add(WorkflowKey::generate().expect("generate"));
        }
        RingOp::AddCsa => {
            let _ = keystore.csa().add(CsaKey::generate().expect("generate"));
        }
        RingOp::EnsureCsa => keystore.csa().ensure_key().expect("ensure csa"),
        RingOp::DeleteWorkflow => {
            if let Some(key) = keystore.workflow().get_all().expect("workflow").first() {
                keystore.workflow().delete(key.id().as_str()).expect("delete");
            }
        }
        RingOp::CreateP2P => {
            keystore.p2p().create().expect("p2p has no limit");
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn singleton_rings_never_hold_more_than_one_key(ops in prop::collection::vec(ring_op(), 1..24)) {
        let keystore = unlocked();
        for op in ops {
            apply(&keystore, op);
            prop_assert!(count(&keystore, KeyKind::Workflow) <= 1, "workflow after {:?}", op);
            prop_assert!(count(&keystore, KeyKind::Csa) <= 1, "csa after {:?}", op);
        }
    }

    #[test]
    fn singleton_rings_hold_under_threaded_interleavings(
        per_thread in prop::collection::vec(prop::collection::vec(racing_op(), 1..6), 2..5),
    ) {
        let keystore = unlocked();
        let handles: Vec<_> = per_thread
            .into_iter()
            .map(|ops| {
                let keystore = keystore.clone();
                thread::spawn(move || ops.into_iter().for_each(|op| apply(&keystore, op)))
            })
            .collect();
        for handle in handles {
            handle.join().expect("join");
        }
        prop_assert!(count(&keystore, KeyKind::Workflow) <= 1);
        prop_assert!(count(&keystore, KeyKind::Csa) <= 1);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn export_then_import_round_trips_id_and_public_key(password in password(), eth in any::<bool>()) {
        let source = unlocked();
        let target = unlocked();
        if eth {
            let key = source.eth().create().expect("eth");
            let blob = source.eth().export(key.id().as_str(), &password).expect("export");
            let imported = target.eth().import(&blob, &password).expect("import");
            prop_assert_eq!(imported.id(), key.id());
            prop_assert_eq!(imported.address(), key.address());
        } else {
            let key = source.p2p().create().expect("p2p");
            let blob = source.p2p().export(key.id().as_str(), &password).expect("export");
            let imported = target.p2p().import(&blob, &password).expect("import");
            prop_assert_eq!(imported.id(), key.id());
            prop_assert_eq!(imported.public_key(), key.public_key());
        }
    }

    #[test]
    fn import_with_another_password_fails_decryption(password in password(), suffix in password()) {
        let keystore = unlocked();
        let key = keystore.csa().create().expect("csa");
        let blob = keystore.csa().export(key.id().as_str(), &password).expect("export");
        keystore.csa().delete(key.id().as_str()).expect("delete");
        let wrong = format!("{}{}", password, suffix);
        let result = keystore.csa().import(&blob, &wrong);
        prop_assert!(matches!(result, Err(NodeError::DecryptionFailed { .. })), "expected DecryptionFailed, got {:?}", result);
    }
}

#[test]
fn second_singleton_create_is_rejected_and_ring_unchanged() {
    let keystore = unlocked();
    let first = keystore.workflow().create().expect("first");
    let err = keystore.workflow().create().expect_err("second");
    assert!(matches!(err, NodeError::KeyAlreadyExists { .. }));
    let all = keystore.workflow().get_all().expect("all");
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id(), first.id());
}

#[test]
fn export_for_one_kind_does_not_import_as_another() {
    let keystore = unlocked();
    let key = keystore.p2p().create().expect("p2p");
    let blob = keystore.p2p().export(key.id().as_str(), TEST_EXPORT_PASSWORD).expect("export");
    assert!(keystore.csa().import(&blob, TEST_EXPORT_PASSWORD).is_err());
}

#[test]
fn oversized_kdf_params_in_import_fail_decryption_and_keystore_stays_usable() {
    let keystore = unlocked();
    let key = keystore.csa().create().expect("csa");
    let blob = keystore.csa().export(key.id().as_str(), TEST_EXPORT_PASSWORD).expect("export");
    keystore.csa().delete(key.id().as_str()).expect("delete");

    let mut export: serde_json::Value = serde_json::from_slice(&blob).expect("json");
    export["crypto"]["kdf_params"]["m_cost"] = serde_json::json!(u32::MAX);
    let crafted = serde_json::to_vec(&export).expect("encode");

    let err = keystore.csa().import(&crafted, TEST_EXPORT_PASSWORD).expect_err("rejected");
    assert!(matches!(err, NodeError::DecryptionFailed { .. }));
    let imported = keystore.csa().import(&blob, TEST_EXPORT_PASSWORD).expect("original still imports");
    assert_eq!(imported.id(), key.id());
}

#[test]
fn locked_keystore_rejects_every_operation() {
    let keystore = unlocked();
    keystore.lock();
    assert!(matches!(keystore.eth().get_all(), Err(NodeError::Locked)));
    assert!(matches!(keystore.csa().create(), Err(NodeError::Locked)));
    assert!(matches!(keystore.p2p().ensure_key(), Err(NodeError::Locked)));
}

#[test]
fn unlock_after_lock_returns_the_exact_key_added() {
    let keystore = unlocked();
    let key = CsaKey::generate().expect("generate");
    keystore.csa().add(key.clone()).expect("add");
    keystore.lock();
    assert!(matches!(keystore.csa().get(key.id().as_str()), Err(NodeError::Locked)));

    keystore.unlock(TEST_PASSWORD).expect("unlock");
    let fetched = keystore.csa().get(key.id().as_str()).expect("get");
    assert_eq!(fetched.public_key(), key.public_key());
    assert_eq!(*fetched.raw(), *key.raw());
}

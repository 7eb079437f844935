use oracle_node_core::domain::keys::{seal_to, CsaKey, EthKey, KeyKind, KeyRing, P2PKey, TypedKey, WorkflowKey};
use oracle_node_core::foundation::NodeError;

#[test]
fn csa_signature_verifies_only_for_signed_message() {
    let key = CsaKey::generate().expect("generate");
    let signature = key.sign(b"attestation");
    CsaKey::verify(&key.public_key(), b"attestation", &signature).expect("valid signature");
    assert!(CsaKey::verify(&key.public_key(), b"tampered", &signature).is_err());
}

#[test]
fn eth_signature_recovers_key_address() {
    let key = EthKey::generate().expect("generate");
    let digest = [0x42u8; 32];
    let signature = key.sign_hash(&digest);
    let recovered = EthKey::recover_address(&digest, &signature).expect("recover");
    assert_eq!(recovered, key.address());
}

#[test]
fn eth_key_id_is_lowercase_address_hex() {
    let key = EthKey::generate().expect("generate");
    let id = key.id().to_string();
    assert_eq!(id, id.to_ascii_lowercase());
    assert!(id.contains(&hex::encode(key.address().as_bytes())));
}

#[test]
fn workflow_key_opens_payload_sealed_to_its_public_key() {
    let key = WorkflowKey::generate().expect("generate");
    let sealed = seal_to(&key.public_key(), b"workflow secret").expect("seal");
    assert_eq!(key.decrypt(&sealed).expect("open"), b"workflow secret".to_vec());

    let other = WorkflowKey::generate().expect("generate");
    let err = other.decrypt(&sealed).expect_err("wrong recipient");
    assert!(matches!(err, NodeError::DecryptionFailed { .. }));
}

#[test]
fn raw_material_reconstructs_the_same_key() {
    let key = P2PKey::generate().expect("generate");
    let restored = P2PKey::from_raw(&key.raw()).expect("from raw");
    assert_eq!(restored.id(), key.id());
    assert_eq!(restored.peer_id(), key.peer_id());
    assert_eq!(restored.public_key(), key.public_key());
}

#[test]
fn ring_survives_raw_round_trip_per_kind() {
    let mut ring = KeyRing::default();
    let csa = CsaKey::generate().expect("csa");
    let p2p_a = P2PKey::generate().expect("p2p");
    let p2p_b = P2PKey::generate().expect("p2p");
    ring.csa.insert(csa.id(), csa.clone());
    ring.p2p.insert(p2p_a.id(), p2p_a.clone());
    ring.p2p.insert(p2p_b.id(), p2p_b.clone());

    let restored = KeyRing::from_raw(&ring.to_raw()).expect("from raw");
    assert_eq!(restored.count(KeyKind::Csa), 1);
    assert_eq!(restored.count(KeyKind::P2P), 2);
    assert_eq!(restored.count(KeyKind::Workflow), 0);
    assert!(restored.csa.contains_key(&csa.id()));
    assert!(restored.p2p.contains_key(&p2p_b.id()));
}

#[test]
fn debug_output_never_contains_private_material() {
    let key = CsaKey::generate().expect("generate");
    let raw_hex = hex::encode(&*key.raw());
    assert!(!format!("{:?}", key).contains(&raw_hex));
}

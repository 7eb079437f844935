//! Encrypted keystore: key ring encryption, persistence, lock state and typed stores.

pub mod audit;
pub mod encrypted_ring;
pub mod export;
pub mod kdf;
pub mod key_manager;
pub mod passphrase;
pub mod persistence;
pub mod stores;

pub use audit::{FileAuditLogger, KeyAuditLogger, KeyLifecycleEvent, KeyLifecycleOperation, NoopAuditLogger};
pub use encrypted_ring::EncryptedKeyRing;
pub use export::{export_key, import_key, EncryptedKeyExport};
pub use kdf::Argon2Params;
pub use key_manager::KeyManager;
pub use persistence::{FileKeyRingStore, KeyRingStore, MemoryKeyRingStore};
pub use stores::{CsaKeyStore, EthKeyStore, Keystore, P2PKeyStore, TypedKeyStore, WorkflowKeyStore};

//! Owner of the decrypted key ring and its lock state.

use super::audit::{KeyAuditLogger, KeyLifecycleEvent, NoopAuditLogger};
use super::encrypted_ring::EncryptedKeyRing;
use super::kdf::Argon2Params;
use super::persistence::KeyRingStore;
use crate::domain::keys::KeyRing;
use crate::foundation::{NodeError, Result};
use parking_lot::RwLock;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use subtle::ConstantTimeEq;

enum State {
    Locked,
    Unlocked { ring: KeyRing, password: SecretString },
}

/// Holds the key ring behind a single reader/writer lock.
///
/// Every mutation is applied to a copy of the ring, sealed and persisted, and only then
/// swapped in; a failed save leaves the in-memory ring untouched.
pub struct KeyManager {
    store: Arc<dyn KeyRingStore>,
    kdf_params: Argon2Params,
    audit: Arc<dyn KeyAuditLogger>,
    state: RwLock<State>,
}

impl KeyManager {
    pub fn new(store: Arc<dyn KeyRingStore>) -> Self {
        Self { store, kdf_params: Argon2Params::default(), audit: Arc::new(NoopAuditLogger), state: RwLock::new(State::Locked) }
    }

    pub fn with_kdf_params(mut self, kdf_params: Argon2Params) -> Self {
        self.kdf_params = kdf_params;
        self
    }

    pub fn with_audit_logger(mut self, audit: Arc<dyn KeyAuditLogger>) -> Self {
        self.audit = audit;
        self
    }

    pub fn kdf_params(&self) -> &Argon2Params {
        &self.kdf_params
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Decrypts the stored ring, or creates and persists an empty one on first use.
    ///
    /// Unlocking again with the same password is a no-op.
    pub fn unlock(&self, password: &str) -> Result<()> {
        let mut state = self.state.write();
        if let State::Unlocked { password: current, .. } = &*state {
            if bool::from(current.expose_secret().as_bytes().ct_eq(password.as_bytes())) {
                return Ok(());
            }
            return Err(NodeError::decryption_failed("keystore is already unlocked with a different password"));
        }

        let ring = match self.store.load_encrypted_key_ring()? {
            Some(blob) => EncryptedKeyRing::from_bytes(&blob)?.open(password)?,
            None => {
                let ring = KeyRing::default();
                let sealed = EncryptedKeyRing::seal(&ring, password, self.kdf_params)?;
                self.store.save_encrypted_key_ring(&sealed.to_bytes())?;
                log::info!("created empty key ring backend={}", self.store.backend());
                ring
            }
        };
        log::info!("keystore unlocked backend={} keys={}", self.store.backend(), ring.len());
        *state = State::Unlocked { ring, password: SecretString::new(password.to_string()) };
        Ok(())
    }

    /// Drops the decrypted ring from memory.
    pub fn lock(&self) {
        let mut state = self.state.write();
        if matches!(*state, State::Unlocked { .. }) {
            log::info!("keystore locked backend={}", self.store.backend());
        }
        *state = State::Locked;
    }

    pub fn is_locked(&self) -> bool {
        matches!(*self.state.read(), State::Locked)
    }

    /// Runs `f` against the ring under the shared lock.
    pub(crate) fn read<T>(&self, f: impl FnOnce(&KeyRing) -> Result<T>) -> Result<T> {
        let state = self.state.read();
        match &*state {
            State::Locked => Err(NodeError::Locked),
            State::Unlocked { ring, .. } => f(ring),
        }
    }

    /// Runs `f` against a copy of the ring under the exclusive lock, persists the copy, then swaps it in.
    pub(crate) fn update<T>(&self, f: impl FnOnce(&mut KeyRing) -> Result<T>) -> Result<T> {
        let mut state = self.state.write();
        let State::Unlocked { ring, password } = &mut *state else {
            return Err(NodeError::Locked);
        };
        let mut next = ring.clone();
        let out = f(&mut next)?;
        let sealed = EncryptedKeyRing::seal(&next, password.expose_secret(), self.kdf_params)?;
        self.store.save_encrypted_key_ring(&sealed.to_bytes())?;
        *ring = next;
        Ok(out)
    }

    /// Audit failures never fail the key operation that triggered them.
    pub(crate) fn audit(&self, event: KeyLifecycleEvent) {
        let (kind, id, operation) = (event.key_type, event.key_id.clone(), event.operation);
        if let Err(err) = self.audit.log_key_lifecycle(event) {
            log::warn!("key audit log write failed key_type={} key_id={} operation={:?} error={}", kind, id, operation, err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::keys::{CsaKey, TypedKey};
    use crate::infrastructure::keys::persistence::MemoryKeyRingStore;

    fn manager(store: Arc<MemoryKeyRingStore>) -> KeyManager {
        KeyManager::new(store).with_kdf_params(Argon2Params::fast())
    }

    #[test]
    fn starts_locked_and_rejects_reads() {
        let km = manager(Arc::new(MemoryKeyRingStore::new()));
        assert!(km.is_locked());
        assert!(matches!(km.read(|ring| Ok(ring.len())), Err(NodeError::Locked)));
    }

    #[test]
    fn first_unlock_persists_empty_ring() {
        let store = Arc::new(MemoryKeyRingStore::new());
        let km = manager(store.clone());
        km.unlock("pw").expect("unlock");
        assert!(store.snapshot().is_some());
        km.unlock("pw").expect("same password is a no-op");
        assert!(matches!(km.unlock("other"), Err(NodeError::DecryptionFailed { .. })));
    }

    #[test]
    fn failed_save_leaves_memory_untouched() {
        let store = Arc::new(MemoryKeyRingStore::new());
        let km = manager(store.clone());
        km.unlock("pw").expect("unlock");
        store.set_fail_saves(true);
        let key = CsaKey::generate().expect("csa");
        let result = km.update(|ring| {
            ring.csa.insert(key.id(), key.clone());
            Ok(())
        });
        assert!(matches!(result, Err(NodeError::StorageError { .. })));
        assert_eq!(km.read(|ring| Ok(ring.len())).expect("read"), 0);
    }

    #[test]
    fn relock_then_unlock_reloads_from_store() {
        let store = Arc::new(MemoryKeyRingStore::new());
        let km = manager(store.clone());
        km.unlock("pw").expect("unlock");
        let key = CsaKey::generate().expect("csa");
        km.update(|ring| {
            ring.csa.insert(key.id(), key.clone());
            Ok(())
        })
        .expect("update");
        km.lock();
        assert!(matches!(km.unlock("wrong"), Err(NodeError::DecryptionFailed { .. })));
        km.unlock("pw").expect("unlock");
        assert!(km.read(|ring| Ok(ring.csa.contains_key(&key.id()))).expect("read"));
    }
}

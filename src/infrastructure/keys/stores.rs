//! Typed key stores sharing one [`KeyManager`].

use super::audit::{KeyLifecycleEvent, KeyLifecycleOperation};
use super::export::{export_key, import_key};
use super::key_manager::KeyManager;
use super::persistence::KeyRingStore;
use crate::domain::keys::{CsaKey, EthKey, KeyRing, P2PKey, TypedKey, WorkflowKey};
use crate::foundation::{KeyId, NodeError, Result};
use std::marker::PhantomData;
use std::sync::Arc;

pub struct TypedKeyStore<K: TypedKey> {
    manager: Arc<KeyManager>,
    _kind: PhantomData<fn() -> K>,
}

pub type WorkflowKeyStore = TypedKeyStore<WorkflowKey>;
pub type CsaKeyStore = TypedKeyStore<CsaKey>;
pub type P2PKeyStore = TypedKeyStore<P2PKey>;
pub type EthKeyStore = TypedKeyStore<EthKey>;

impl<K: TypedKey> Clone for TypedKeyStore<K> {
    fn clone(&self) -> Self {
        Self { manager: Arc::clone(&self.manager), _kind: PhantomData }
    }
}

impl<K: TypedKey> TypedKeyStore<K> {
    pub fn new(manager: Arc<KeyManager>) -> Self {
        Self { manager, _kind: PhantomData }
    }

    pub fn get(&self, id: &str) -> Result<K> {
        self.manager.read(|ring| Self::get_by_id(ring, id).cloned())
    }

    /// Keys in ascending id order.
    pub fn get_all(&self) -> Result<Vec<K>> {
        self.manager.read(|ring| Ok(K::slot(ring).values().cloned().collect()))
    }

    pub fn create(&self) -> Result<K> {
        let key = self.manager.update(|ring| {
            Self::ensure_singleton_free(ring)?;
            let key = K::generate()?;
            Self::insert_new(ring, key.clone())?;
            Ok(key)
        })?;
        log::info!("created key key_type={} key_id={}", K::KIND, key.id());
        self.manager.audit(KeyLifecycleEvent::now(K::KIND, key.id().to_string(), KeyLifecycleOperation::Created));
        Ok(key)
    }

    pub fn add(&self, key: K) -> Result<()> {
        let id = key.id();
        self.manager.update(|ring| {
            Self::ensure_singleton_free(ring)?;
            Self::insert_new(ring, key)
        })?;
        log::info!("added key key_type={} key_id={}", K::KIND, id);
        self.manager.audit(KeyLifecycleEvent::now(K::KIND, id.to_string(), KeyLifecycleOperation::Created));
        Ok(())
    }

    pub fn delete(&self, id: &str) -> Result<K> {
        let key = self.manager.update(|ring| {
            let key = Self::get_by_id(ring, id)?.clone();
            K::slot_mut(ring).remove(&key.id());
            Ok(key)
        })?;
        log::info!("deleted key key_type={} key_id={}", K::KIND, key.id());
        self.manager.audit(KeyLifecycleEvent::now(K::KIND, key.id().to_string(), KeyLifecycleOperation::Deleted));
        Ok(key)
    }

    /// Decrypts an exported key and inserts it. The existence check and the insertion share one write lock.
    pub fn import(&self, json: &[u8], password: &str) -> Result<K> {
        let key = self.manager.update(|ring| {
            let key: K = import_key(json, password)?;
            Self::ensure_singleton_free(ring)?;
            Self::insert_new(ring, key.clone())?;
            Ok(key)
        })?;
        log::info!("imported key key_type={} key_id={}", K::KIND, key.id());
        self.manager.audit(KeyLifecycleEvent::now(K::KIND, key.id().to_string(), KeyLifecycleOperation::Imported));
        Ok(key)
    }

    pub fn export(&self, id: &str, password: &str) -> Result<Vec<u8>> {
        let kdf_params = *self.manager.kdf_params();
        let blob = self.manager.read(|ring| export_key(Self::get_by_id(ring, id)?, password, &kdf_params))?;
        self.manager.audit(KeyLifecycleEvent::now(K::KIND, id, KeyLifecycleOperation::Exported));
        Ok(blob)
    }

    /// Creates a key only when this type's ring is empty. Concurrent callers leave exactly one key.
    pub fn ensure_key(&self) -> Result<()> {
        let created = self.manager.update(|ring| {
            if !K::slot(ring).is_empty() {
                return Ok(None);
            }
            let key = K::generate()?;
            K::slot_mut(ring).insert(key.id(), key.clone());
            Ok(Some(key))
        })?;
        if let Some(key) = created {
            log::info!("created key key_type={} key_id={} reason=ensure_key", K::KIND, key.id());
            self.manager.audit(KeyLifecycleEvent::now(K::KIND, key.id().to_string(), KeyLifecycleOperation::Created));
        }
        Ok(())
    }

    fn get_by_id<'a>(ring: &'a KeyRing, id: &str) -> Result<&'a K> {
        K::slot(ring).get(&KeyId::normalized(id)).ok_or_else(|| NodeError::key_not_found(K::KIND.as_str(), id))
    }

    fn ensure_singleton_free(ring: &KeyRing) -> Result<()> {
        if K::KIND.is_singleton() && !K::slot(ring).is_empty() {
            return Err(NodeError::key_already_exists(K::KIND.as_str(), format!("can only have 1 {} key", K::KIND)));
        }
        Ok(())
    }

    fn insert_new(ring: &mut KeyRing, key: K) -> Result<()> {
        let id = key.id();
        let slot = K::slot_mut(ring);
        if slot.contains_key(&id) {
            return Err(NodeError::key_already_exists(K::KIND.as_str(), format!("key with ID {} already exists", id)));
        }
        slot.insert(id, key);
        Ok(())
    }
}

/// Entry point bundling the key manager with one store per key type.
#[derive(Clone)]
pub struct Keystore {
    manager: Arc<KeyManager>,
}

impl Keystore {
    pub fn new(manager: KeyManager) -> Self {
        Self { manager: Arc::new(manager) }
    }

    pub fn open(store: Arc<dyn KeyRingStore>) -> Self {
        Self::new(KeyManager::new(store))
    }

    pub fn manager(&self) -> &Arc<KeyManager> {
        &self.manager
    }

    pub fn unlock(&self, password: &str) -> Result<()> {
        self.manager.unlock(password)
    }

    pub fn lock(&self) {
        self.manager.lock()
    }

    pub fn is_locked(&self) -> bool {
        self.manager.is_locked()
    }

    pub fn workflow(&self) -> WorkflowKeyStore {
        TypedKeyStore::new(Arc::clone(&self.manager))
    }

    pub fn csa(&self) -> CsaKeyStore {
        TypedKeyStore::new(Arc::clone(&self.manager))
    }

    pub fn p2p(&self) -> P2PKeyStore {
        TypedKeyStore::new(Arc::clone(&self.manager))
    }

    pub fn eth(&self) -> EthKeyStore {
        TypedKeyStore::new(Arc::clone(&self.manager))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::keys::kdf::Argon2Params;
    use crate::infrastructure::keys::persistence::MemoryKeyRingStore;

    fn keystore() -> Keystore {
        let ks = Keystore::new(KeyManager::new(Arc::new(MemoryKeyRingStore::new())).with_kdf_params(Argon2Params::fast()));
        ks.unlock("pw").expect("unlock");
        ks
    }

    #[test]
    fn singleton_create_twice_fails() {
        let ks = keystore();
        ks.workflow().create().expect("first");
        let err = ks.workflow().create().expect_err("second");
        assert!(matches!(err, NodeError::KeyAlreadyExists { .. }));
        assert!(err.to_string().contains("can only have 1 workflow key"));
    }

    #[test]
    fn multi_key_rings_accept_many() {
        let ks = keystore();
        let a = ks.eth().create().expect("a");
        let b = ks.eth().create().expect("b");
        assert_ne!(a.id(), b.id());
        assert_eq!(ks.eth().get_all().expect("all").len(), 2);
    }

    #[test]
    fn adding_existing_id_fails() {
        let ks = keystore();
        let key = ks.p2p().create().expect("create");
        let err = ks.p2p().add(key.clone()).expect_err("duplicate");
        assert!(err.to_string().contains(&format!("key with ID {} already exists", key.id())));
    }

    #[test]
    fn delete_missing_key_is_not_found() {
        let ks = keystore();
        let err = ks.csa().delete("abc").expect_err("missing");
        assert!(matches!(err, NodeError::KeyNotFound { .. }));
    }

    #[test]
    fn get_accepts_mixed_case_eth_address() {
        let ks = keystore();
        let key = ks.eth().create().expect("create");
        let upper = key.id().to_ascii_uppercase().replacen("0X", "0x", 1);
        assert_eq!(ks.eth().get(&upper).expect("get").id(), key.id());
    }

    #[test]
    fn import_existing_key_fails_under_same_lock() {
        let ks = keystore();
        let key = ks.p2p().create().expect("create");
        let blob = ks.p2p().export(key.id().as_str(), "export-pw").expect("export");
        let err = ks.p2p().import(&blob, "export-pw").expect_err("already present");
        assert!(matches!(err, NodeError::KeyAlreadyExists { .. }));
    }

    #[test]
    fn ensure_key_is_idempotent() {
        let ks = keystore();
        ks.csa().ensure_key().expect("first");
        ks.csa().ensure_key().expect("second");
        assert_eq!(ks.csa().get_all().expect("all").len(), 1);
    }

    #[test]
    fn locked_keystore_rejects_every_operation() {
        let ks = keystore();
        ks.lock();
        assert!(matches!(ks.workflow().get_all(), Err(NodeError::Locked)));
        assert!(matches!(ks.workflow().create(), Err(NodeError::Locked)));
        assert!(matches!(ks.workflow().ensure_key(), Err(NodeError::Locked)));
    }
}

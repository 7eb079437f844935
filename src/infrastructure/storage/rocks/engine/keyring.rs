use super::RocksStorage;
use crate::foundation::Result;
use crate::infrastructure::keys::KeyRingStore;
use crate::infrastructure::storage::rocks::schema::{CF_KEYRING, KEY_KEYRING};
use crate::infrastructure::storage::rocks::util::acquire_with_timeout;
use crate::storage_err;

/// The encrypted key ring lives in a single row.
impl KeyRingStore for RocksStorage {
    fn backend(&self) -> &'static str {
        "rocksdb"
    }

    fn load_encrypted_key_ring(&self) -> Result<Option<Vec<u8>>> {
        let cf = self.cf_handle(CF_KEYRING)?;
        self.db.get_cf(cf, KEY_KEYRING).map_err(|err| storage_err!("rocksdb get_cf keyring", err))
    }

    fn save_encrypted_key_ring(&self, blob: &[u8]) -> Result<()> {
        let _guard = acquire_with_timeout(&self.keyring_lock, "save_encrypted_key_ring")?;
        let cf = self.cf_handle(CF_KEYRING)?;
        self.db.put_cf(cf, KEY_KEYRING, blob).map_err(|err| storage_err!("rocksdb put_cf keyring", err))
    }
}

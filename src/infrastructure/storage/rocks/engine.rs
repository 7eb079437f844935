//! RocksDB-backed storage engine.
//!
//! # Lock Semantics
//!
//! RocksDB itself is thread-safe; the coarse mutexes below keep read-modify-write
//! sequences (scan then batch delete) consistent.
//!
//! - `chain_lock`: guards block/log/filter writes for every chain.
//! - `keyring_lock`: guards the key ring row.
//!
//! Locks are acquired with a bounded timeout (`STORAGE_LOCK_TIMEOUT_SECS`). Acquire at most one at a time.

use crate::foundation::{NodeError, Result};
use crate::infrastructure::storage::rocks::migration::open_db_with_cfs;
use crate::infrastructure::storage::rocks::schema::*;
use crate::storage_err;
use bincode::Options;
use log::{debug, info, warn};
use rocksdb::{ColumnFamily, Direction, IteratorMode, DB};
use std::path::Path;
use std::sync::Arc;
use std::{env, fs};

mod keyring;
mod orm;

pub use orm::RocksLogPollerOrm;

const SCHEMA_VERSION: u32 = 1;
const DB_DIR_NAME: &str = "oracle-node";

pub struct RocksStorage {
    db: Arc<DB>,
    chain_lock: std::sync::Mutex<()>,
    keyring_lock: std::sync::Mutex<()>,
}

impl RocksStorage {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_options(path, false)
    }

    pub fn open_with_options(path: impl AsRef<Path>, allow_schema_wipe: bool) -> Result<Self> {
        let path = path.as_ref();
        debug!("opening RocksStorage path={}", path.display());
        let db = open_db_with_cfs(path)?;
        let storage = Self { db: Arc::new(db), chain_lock: std::sync::Mutex::new(()), keyring_lock: std::sync::Mutex::new(()) };
        if let Err(err) = storage.maybe_run_migrations() {
            if allow_schema_wipe {
                if let NodeError::SchemaMismatch { stored, current } = err {
                    warn!("schema mismatch (stored={}, current={}); wiping db path={}", stored, current, path.display());
                    drop(storage);
                    if path.exists() {
                        fs::remove_dir_all(path).map_err(|err| storage_err!("fs::remove_dir_all schema_wipe", err))?;
                    }
                    return Self::open_with_options(path, false);
                }
            }
            return Err(err);
        }
        info!("RocksStorage opened path={}", path.display());
        Ok(storage)
    }

    /// Opens `<data_dir>/oracle-node`, falling back to `ORACLE_NODE_DATA_DIR` and then `./.oracle-node`
    /// when `data_dir` is empty.
    pub fn open_in_dir_with_options(data_dir: impl AsRef<Path>, allow_schema_wipe: bool) -> Result<Self> {
        let mut dir = data_dir.as_ref().to_path_buf();
        if dir.as_os_str().is_empty() {
            dir = match env::var("ORACLE_NODE_DATA_DIR") {
                Ok(value) if !value.trim().is_empty() => value.trim().into(),
                _ => env::current_dir().map_err(|err| storage_err!("env::current_dir", err))?.join(".oracle-node"),
            };
        }
        fs::create_dir_all(&dir).map_err(|err| storage_err!("fs::create_dir_all open_in_dir", err))?;
        let path = dir.join(DB_DIR_NAME);
        debug!("opening RocksStorage in dir path={}", path.display());
        Self::open_with_options(path, allow_schema_wipe)
    }

    pub fn open_in_dir(data_dir: impl AsRef<Path>) -> Result<Self> {
        Self::open_in_dir_with_options(data_dir, false)
    }

    /// Scopes this storage to one chain for the log poller.
    pub fn log_poller_orm(self: &Arc<Self>, chain_id: u64) -> RocksLogPollerOrm {
        RocksLogPollerOrm::new(Arc::clone(self), chain_id)
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| NodeError::StorageError {
            operation: "rocksdb cf_handle".to_string(),
            details: format!("missing column family: {}", name),
        })
    }

    fn maybe_run_migrations(&self) -> Result<()> {
        match self.schema_version()? {
            None => {
                info!("initializing fresh db schema schema_version={}", SCHEMA_VERSION);
                self.set_schema_version(SCHEMA_VERSION)?;
            }
            Some(v) if v == SCHEMA_VERSION => {}
            Some(v) => return Err(NodeError::SchemaMismatch { stored: v, current: SCHEMA_VERSION }),
        }
        Ok(())
    }

    fn schema_version(&self) -> Result<Option<u32>> {
        let cf = self.cf_handle(CF_METADATA)?;
        match self.db.get_cf(cf, KEY_SCHEMA_VERSION) {
            Ok(Some(bytes)) => {
                let array: [u8; 4] = bytes.as_slice().try_into().map_err(|_| NodeError::StorageError {
                    operation: "schema_version decode".to_string(),
                    details: "corrupt schema version".to_string(),
                })?;
                Ok(Some(u32::from_be_bytes(array)))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(storage_err!("rocksdb get_cf schema_version", e)),
        }
    }

    fn set_schema_version(&self, version: u32) -> Result<()> {
        let cf = self.cf_handle(CF_METADATA)?;
        self.db.put_cf(cf, KEY_SCHEMA_VERSION, version.to_be_bytes()).map_err(NodeError::from)
    }

    fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        bincode::DefaultOptions::new().with_fixint_encoding().serialize(value).map_err(|err| err.into())
    }

    fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        bincode::DefaultOptions::new().with_fixint_encoding().deserialize(bytes).map_err(|err| err.into())
    }

    /// Values under `prefix` from `from` up to and including `through`, ascending, decoded.
    /// Iteration stops at the first key past `through`.
    fn scan_forward<T: serde::de::DeserializeOwned>(
        &self,
        cf_name: &str,
        prefix: &[u8],
        from: &[u8],
        through: Option<&[u8]>,
    ) -> Result<Vec<(Vec<u8>, T)>> {
        let cf = self.cf_handle(cf_name)?;
        let mut out = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::From(from, Direction::Forward)) {
            let (key, value) = item.map_err(|err| storage_err!("rocksdb iterator", err))?;
            if !key.starts_with(prefix) || through.is_some_and(|through| &key[..] > through) {
                break;
            }
            out.push((key.to_vec(), Self::decode(&value)?));
        }
        Ok(out)
    }

    /// Keys under `prefix` from `from` up to and including `through`. Values are not decoded.
    fn keys_forward(&self, cf_name: &str, prefix: &[u8], from: &[u8], through: Option<&[u8]>) -> Result<Vec<Vec<u8>>> {
        let cf = self.cf_handle(cf_name)?;
        let mut out = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::From(from, Direction::Forward)) {
            let (key, _) = item.map_err(|err| storage_err!("rocksdb iterator", err))?;
            if !key.starts_with(prefix) || through.is_some_and(|through| &key[..] > through) {
                break;
            }
            out.push(key.to_vec());
        }
        Ok(out)
    }

    /// First decoded value under `prefix` at or below `from` (descending) that satisfies `pred`.
    fn find_backward<T: serde::de::DeserializeOwned>(
        &self,
        cf_name: &str,
        prefix: &[u8],
        from: &[u8],
        pred: impl Fn(&T) -> bool,
    ) -> Result<Option<T>> {
        let cf = self.cf_handle(cf_name)?;
        for item in self.db.iterator_cf(cf, IteratorMode::From(from, Direction::Reverse)) {
            let (key, value) = item.map_err(|err| storage_err!("rocksdb iterator", err))?;
            if !key.starts_with(prefix) {
                break;
            }
            let decoded: T = Self::decode(&value)?;
            if pred(&decoded) {
                return Ok(Some(decoded));
            }
        }
        Ok(None)
    }

    pub fn compact(&self) -> Result<()> {
        debug!("rocksdb compact_range start");
        self.db.compact_range(None::<&[u8]>, None::<&[u8]>);
        debug!("rocksdb compact_range complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reopen_keeps_schema_version() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let storage = RocksStorage::open_in_dir(dir.path()).expect("open");
            assert_eq!(storage.schema_version().expect("version"), Some(SCHEMA_VERSION));
        }
        let storage = RocksStorage::open_in_dir(dir.path()).expect("reopen");
        assert_eq!(storage.schema_version().expect("version"), Some(SCHEMA_VERSION));
    }

    #[test]
    fn schema_mismatch_is_rejected_unless_wipe_allowed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("db");
        {
            let storage = RocksStorage::open(&path).expect("open");
            storage.set_schema_version(SCHEMA_VERSION + 1).expect("bump");
        }
        let err = RocksStorage::open(&path).err().expect("mismatch");
        assert!(matches!(err, NodeError::SchemaMismatch { .. }));
        let storage = RocksStorage::open_with_options(&path, true).expect("wipe and reopen");
        assert_eq!(storage.schema_version().expect("version"), Some(SCHEMA_VERSION));
    }
}

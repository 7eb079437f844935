//! Storage backends for the single encrypted key ring blob.

use crate::foundation::{NodeError, Result, KEY_RING_FILE_NAME};
use parking_lot::Mutex;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Persists the encrypted key ring. Implementations never see plaintext.
pub trait KeyRingStore: Send + Sync {
    fn backend(&self) -> &'static str;

    /// `None` when no key ring has been saved yet.
    fn load_encrypted_key_ring(&self) -> Result<Option<Vec<u8>>>;

    fn save_encrypted_key_ring(&self, blob: &[u8]) -> Result<()>;
}

#[derive(Default)]
pub struct MemoryKeyRingStore {
    blob: Mutex<Option<Vec<u8>>>,
    fail_saves: AtomicBool,
}

impl MemoryKeyRingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent save fail until reset.
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> Option<Vec<u8>> {
        self.blob.lock().clone()
    }
}

impl KeyRingStore for MemoryKeyRingStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn load_encrypted_key_ring(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.blob.lock().clone())
    }

    fn save_encrypted_key_ring(&self, blob: &[u8]) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(crate::storage_err!("save key ring", "memory store configured to fail"));
        }
        *self.blob.lock() = Some(blob.to_vec());
        Ok(())
    }
}

/// Key ring file written atomically (tmp + rename) with owner-only permissions.
pub struct FileKeyRingStore {
    path: PathBuf,
}

impl FileKeyRingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(KEY_RING_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    #[cfg(target_family = "unix")]
    fn validate_file_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::MetadataExt;
        let mode = std::fs::metadata(path).map_err(|e| crate::storage_err!("stat key ring", e))?.mode() & 0o777;
        if mode != 0o600 {
            return Err(NodeError::InsecureFilePermissions { path: path.display().to_string(), mode });
        }
        Ok(())
    }

    #[cfg(target_family = "unix")]
    fn set_file_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(path).map_err(|e| crate::storage_err!("stat key ring", e))?.permissions();
        perms.set_mode(0o600);
        std::fs::set_permissions(path, perms).map_err(|e| crate::storage_err!("chmod key ring", e))?;
        Ok(())
    }
}

impl KeyRingStore for FileKeyRingStore {
    fn backend(&self) -> &'static str {
        "file"
    }

    fn load_encrypted_key_ring(&self) -> Result<Option<Vec<u8>>> {
        if !self.path.exists() {
            return Ok(None);
        }
        #[cfg(target_family = "unix")]
        Self::validate_file_permissions(&self.path)?;
        let data = std::fs::read(&self.path).map_err(|e| crate::storage_err!("read key ring", e))?;
        Ok(Some(data))
    }

    fn save_encrypted_key_ring(&self, blob: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| crate::storage_err!("create key ring dir", e))?;
            }
        }
        let temp_path = self.path.with_extension("tmp");
        {
            let mut file = std::fs::File::create(&temp_path).map_err(|e| crate::storage_err!("write key ring", e))?;
            #[cfg(target_family = "unix")]
            Self::set_file_permissions(&temp_path)?;
            file.write_all(blob).map_err(|e| crate::storage_err!("write key ring", e))?;
            file.sync_all().map_err(|e| crate::storage_err!("sync key ring", e))?;
        }
        std::fs::rename(&temp_path, &self.path).map_err(|e| crate::storage_err!("rename key ring", e))?;
        log::debug!("key ring saved path={} bytes={}", self.path.display(), blob.len());
        Ok(())
    }
}

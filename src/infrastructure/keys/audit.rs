//! Audit trail for key lifecycle operations.

use crate::domain::keys::KeyKind;
use crate::foundation::{NodeError, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyLifecycleOperation {
    Created,
    Imported,
    Exported,
    Deleted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyLifecycleEvent {
    pub timestamp: u64,
    pub key_type: KeyKind,
    pub key_id: String,
    pub operation: KeyLifecycleOperation,
}

impl KeyLifecycleEvent {
    pub fn now(key_type: KeyKind, key_id: impl Into<String>, operation: KeyLifecycleOperation) -> Self {
        Self { timestamp: crate::foundation::now_nanos(), key_type, key_id: key_id.into(), operation }
    }
}

pub trait KeyAuditLogger: Send + Sync {
    fn log_key_lifecycle(&self, event: KeyLifecycleEvent) -> Result<()>;
}

pub struct NoopAuditLogger;

impl KeyAuditLogger for NoopAuditLogger {
    fn log_key_lifecycle(&self, _event: KeyLifecycleEvent) -> Result<()> {
        Ok(())
    }
}

/// Appends one JSON object per line.
pub struct FileAuditLogger {
    file: Mutex<File>,
}

impl FileAuditLogger {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path.as_ref()).map_err(|e| NodeError::AuditLogError {
            details: format!("failed to open audit log: {}", e),
            source: Some(Box::new(e)),
        })?;
        Ok(Self { file: Mutex::new(file) })
    }
}

impl KeyAuditLogger for FileAuditLogger {
    fn log_key_lifecycle(&self, event: KeyLifecycleEvent) -> Result<()> {
        let json = serde_json::to_string(&serde_json::json!({ "event_type": "lifecycle", "event": event })).map_err(|e| {
            NodeError::AuditLogError { details: format!("failed to serialize audit event: {}", e), source: Some(Box::new(e)) }
        })?;
        let mut file = self.file.lock();
        writeln!(file, "{}", json)
            .and_then(|_| file.flush())
            .map_err(|e| NodeError::AuditLogError { details: format!("failed to write audit event: {}", e), source: Some(Box::new(e)) })
    }
}

use std::io;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Locked,
    KeyNotFound,
    KeyAlreadyExists,
    DecryptionFailed,
    UnsupportedKeyRingFormat,
    InvalidKeyMaterial,
    ChainClientTransient,
    ChainClientInvalidResponse,
    ReconciliationFailed,
    FinalityViolation,
    ReplayOutOfRange,
    InvalidFilter,
    NoRows,
    Cancelled,
    StorageError,
    SerializationError,
    CryptoError,
    EncodingError,
    ConfigError,
    InvalidStateTransition,
    SchemaMismatch,
    StorageLockTimeout,
    InsecureFilePermissions,
    AuditLogError,
    Message,
}

#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum NodeError {
    // === Keystore Errors ===
    #[error("keystore is locked")]
    Locked,

    #[error("unable to find {kind} key with id {id}")]
    KeyNotFound { kind: String, id: String },

    #[error("{kind} key already exists: {details}")]
    KeyAlreadyExists { kind: String, details: String },

    #[error("decryption failed: {details}")]
    DecryptionFailed { details: String },

    #[error("unsupported key ring format: {details}")]
    UnsupportedKeyRingFormat { details: String },

    #[error("invalid {kind} key material: {details}")]
    InvalidKeyMaterial { kind: String, details: String },

    // === Chain / Log Poller Errors ===
    #[error("chain client error during {operation}: {details}")]
    ChainClientTransient { operation: String, details: String },

    #[error("invalid chain client response during {operation}: {details}")]
    ChainClientInvalidResponse { operation: String, details: String },

    #[error("reconciliation failed at block {block}: {details}")]
    ReconciliationFailed { block: u64, details: String },

    #[error("reorg deeper than finality: diverged at block {block}, finalized through {finalized}")]
    FinalityViolation { block: u64, finalized: u64 },

    #[error("replay start {from} is beyond latest stored block {latest}")]
    ReplayOutOfRange { from: u64, latest: u64 },

    #[error("invalid filter {name}: {details}")]
    InvalidFilter { name: String, details: String },

    #[error("no rows")]
    NoRows,

    #[error("operation cancelled")]
    Cancelled,

    // === Storage / Encoding Errors ===
    #[error("storage error during {operation}: {details}")]
    StorageError { operation: String, details: String },

    #[error("{format} serialization error: {details}")]
    SerializationError { format: String, details: String },

    #[error("crypto error during {operation}: {details}")]
    CryptoError { operation: String, details: String },

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("schema mismatch: stored={stored} current={current}")]
    SchemaMismatch { stored: u32, current: u32 },

    #[error("storage lock timeout: {operation} (waited {timeout_secs}s)")]
    StorageLockTimeout { operation: String, timeout_secs: u64 },

    #[error("invalid key ring file permissions: {path} has mode {mode:o}, expected 0600")]
    InsecureFilePermissions { path: String, mode: u32 },

    #[error("audit log error: {details}")]
    AuditLogError {
        details: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("{0}")]
    Message(String),
}

pub type Result<T> = std::result::Result<T, NodeError>;

impl NodeError {
    pub fn code(&self) -> ErrorCode {
        match self {
            NodeError::Locked => ErrorCode::Locked,
            NodeError::KeyNotFound { .. } => ErrorCode::KeyNotFound,
            NodeError::KeyAlreadyExists { .. } => ErrorCode::KeyAlreadyExists,
            NodeError::DecryptionFailed { .. } => ErrorCode::DecryptionFailed,
            NodeError::UnsupportedKeyRingFormat { .. } => ErrorCode::UnsupportedKeyRingFormat,
            NodeError::InvalidKeyMaterial { .. } => ErrorCode::InvalidKeyMaterial,
            NodeError::ChainClientTransient { .. } => ErrorCode::ChainClientTransient,
            NodeError::ChainClientInvalidResponse { .. } => ErrorCode::ChainClientInvalidResponse,
            NodeError::ReconciliationFailed { .. } => ErrorCode::ReconciliationFailed,
            NodeError::FinalityViolation { .. } => ErrorCode::FinalityViolation,
            NodeError::ReplayOutOfRange { .. } => ErrorCode::ReplayOutOfRange,
            NodeError::InvalidFilter { .. } => ErrorCode::InvalidFilter,
            NodeError::NoRows => ErrorCode::NoRows,
            NodeError::Cancelled => ErrorCode::Cancelled,
            NodeError::StorageError { .. } => ErrorCode::StorageError,
            NodeError::SerializationError { .. } => ErrorCode::SerializationError,
            NodeError::CryptoError { .. } => ErrorCode::CryptoError,
            NodeError::EncodingError(_) => ErrorCode::EncodingError,
            NodeError::ConfigError(_) => ErrorCode::ConfigError,
            NodeError::InvalidStateTransition { .. } => ErrorCode::InvalidStateTransition,
            NodeError::SchemaMismatch { .. } => ErrorCode::SchemaMismatch,
            NodeError::StorageLockTimeout { .. } => ErrorCode::StorageLockTimeout,
            NodeError::InsecureFilePermissions { .. } => ErrorCode::InsecureFilePermissions,
            NodeError::AuditLogError { .. } => ErrorCode::AuditLogError,
            NodeError::Message(_) => ErrorCode::Message,
        }
    }

    pub fn context(&self) -> ErrorContext {
        ErrorContext { code: self.code(), message: self.to_string() }
    }

    /// Errors worth retrying on the next attempt or tick without operator action.
    pub fn is_transient(&self) -> bool {
        matches!(self, NodeError::ChainClientTransient { .. } | NodeError::StorageLockTimeout { .. })
    }

    pub fn key_not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        NodeError::KeyNotFound { kind: kind.into(), id: id.into() }
    }

    pub fn key_already_exists(kind: impl Into<String>, details: impl Into<String>) -> Self {
        NodeError::KeyAlreadyExists { kind: kind.into(), details: details.into() }
    }

    pub fn decryption_failed(details: impl Into<String>) -> Self {
        NodeError::DecryptionFailed { details: details.into() }
    }

    pub fn unsupported_key_ring_format(details: impl Into<String>) -> Self {
        NodeError::UnsupportedKeyRingFormat { details: details.into() }
    }

    pub fn invalid_key_material(kind: impl Into<String>, details: impl Into<String>) -> Self {
        NodeError::InvalidKeyMaterial { kind: kind.into(), details: details.into() }
    }

    pub fn chain_transient(operation: impl Into<String>, details: impl Into<String>) -> Self {
        NodeError::ChainClientTransient { operation: operation.into(), details: details.into() }
    }

    pub fn chain_invalid_response(operation: impl Into<String>, details: impl Into<String>) -> Self {
        NodeError::ChainClientInvalidResponse { operation: operation.into(), details: details.into() }
    }

    pub fn crypto(operation: impl Into<String>, details: impl Into<String>) -> Self {
        NodeError::CryptoError { operation: operation.into(), details: details.into() }
    }
}

impl From<hex::FromHexError> for NodeError {
    fn from(err: hex::FromHexError) -> Self {
        NodeError::EncodingError(format!("hex decode error: {}", err))
    }
}

impl From<toml::de::Error> for NodeError {
    fn from(err: toml::de::Error) -> Self {
        NodeError::ConfigError(format!("TOML parsing error: {}", err))
    }
}

impl From<figment::Error> for NodeError {
    fn from(err: figment::Error) -> Self {
        NodeError::ConfigError(format!("config extraction failed: {}", err))
    }
}

impl From<rocksdb::Error> for NodeError {
    fn from(err: rocksdb::Error) -> Self {
        NodeError::StorageError { operation: "rocksdb".to_string(), details: err.to_string() }
    }
}

impl From<bincode::Error> for NodeError {
    fn from(err: bincode::Error) -> Self {
        NodeError::SerializationError { format: "bincode".to_string(), details: err.to_string() }
    }
}

impl From<reqwest::Error> for NodeError {
    fn from(err: reqwest::Error) -> Self {
        let operation = err.url().map(|url| format!("http {}", url.host_str().unwrap_or("unknown"))).unwrap_or_else(|| "http".to_string());
        NodeError::ChainClientTransient { operation, details: err.to_string() }
    }
}

#[macro_export]
macro_rules! storage_err {
    ($op:expr, $err:expr) => {
        $crate::foundation::NodeError::StorageError { operation: $op.into(), details: $err.to_string() }
    };
}

#[macro_export]
macro_rules! serde_err {
    ($fmt:expr, $err:expr) => {
        $crate::foundation::NodeError::SerializationError { format: $fmt.into(), details: $err.to_string() }
    };
}

impl From<io::Error> for NodeError {
    fn from(err: io::Error) -> Self {
        NodeError::StorageError { operation: "io".to_string(), details: err.to_string() }
    }
}

impl From<serde_json::Error> for NodeError {
    fn from(err: serde_json::Error) -> Self {
        NodeError::SerializationError { format: "json".to_string(), details: err.to_string() }
    }
}

impl From<secp256k1::Error> for NodeError {
    fn from(err: secp256k1::Error) -> Self {
        NodeError::CryptoError { operation: "secp256k1".to_string(), details: err.to_string() }
    }
}

// NOTE: Avoid adding generic "stringly" error conversions here.
// Use structured `NodeError` variants at the call site to preserve context.

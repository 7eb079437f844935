use crate::foundation::{
    ChainId, DEFAULT_BACKFILL_BATCH_SIZE, DEFAULT_FINALITY_DEPTH, DEFAULT_POLL_PERIOD_MS, DEFAULT_PRUNE_PERIOD_SECS,
    DEFAULT_RPC_REQUEST_TIMEOUT_MS, DEFAULT_RPC_RETRY_ATTEMPTS, DEFAULT_RPC_RETRY_DELAY_MS,
};
use crate::infrastructure::keys::Argon2Params;
use crate::infrastructure::rpc::CircuitBreakerConfig;
use figment::value::{Dict, Map};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where the encrypted key ring is persisted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeystoreBackend {
    /// `keyring.bin` next to the data dir (atomic rename, 0600).
    #[default]
    File,
    /// A single row in the node's RocksDB.
    #[serde(alias = "rocksdb")]
    Rocks,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct KeystoreConfig {
    /// Explicit key ring file; defaults to `<data_dir>/keyring.bin` for the file backend.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub backend: KeystoreBackend,
    #[serde(default)]
    pub kdf: Argon2Params,
    /// JSON-lines key lifecycle log. Disabled when unset.
    #[serde(default)]
    pub audit_log_path: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogPollerConfig {
    #[serde(default)]
    pub chain_id: ChainId,
    #[serde(default = "default_poll_period_ms")]
    pub poll_period_ms: u64,
    /// Blocks behind latest treated as final when the finality tag is not used.
    #[serde(default = "default_finality_depth")]
    pub finality_depth: u64,
    /// Ask the node for its `finalized` block instead of counting depth.
    #[serde(default)]
    pub use_finality_tag: bool,
    #[serde(default = "default_backfill_batch_size")]
    pub backfill_batch_size: u64,
    /// Finalized blocks kept below the latest finalized block. 0 disables pruning.
    #[serde(default)]
    pub keep_finalized_blocks_depth: u64,
    /// First block to poll on an empty database. Defaults to the finalized head.
    #[serde(default)]
    pub start_block: Option<u64>,
    #[serde(default = "default_prune_period_secs")]
    pub prune_period_secs: u64,
}

fn default_poll_period_ms() -> u64 {
    DEFAULT_POLL_PERIOD_MS
}

fn default_finality_depth() -> u64 {
    DEFAULT_FINALITY_DEPTH
}

fn default_backfill_batch_size() -> u64 {
    DEFAULT_BACKFILL_BATCH_SIZE
}

fn default_prune_period_secs() -> u64 {
    DEFAULT_PRUNE_PERIOD_SECS
}

impl Default for LogPollerConfig {
    fn default() -> Self {
        Self {
            chain_id: 0,
            poll_period_ms: default_poll_period_ms(),
            finality_depth: default_finality_depth(),
            use_finality_tag: false,
            backfill_batch_size: default_backfill_batch_size(),
            keep_finalized_blocks_depth: 0,
            start_block: None,
            prune_period_secs: default_prune_period_secs(),
        }
    }
}

impl LogPollerConfig {
    pub fn poll_period(&self) -> Duration {
        Duration::from_millis(self.poll_period_ms)
    }

    pub fn prune_period(&self) -> Duration {
        Duration::from_secs(self.prune_period_secs)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcConfig {
    /// JSON-RPC endpoints; the first one is the primary.
    #[serde(default)]
    pub endpoints: Vec<String>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: usize,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_RPC_REQUEST_TIMEOUT_MS
}

fn default_retry_attempts() -> usize {
    DEFAULT_RPC_RETRY_ATTEMPTS
}

fn default_retry_delay_ms() -> u64 {
    DEFAULT_RPC_RETRY_DELAY_MS
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            request_timeout_ms: default_request_timeout_ms(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl RpcConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub data_dir: String,
    /// Devnet-only escape hatch: wipe RocksDB if schema version mismatches.
    #[serde(default)]
    pub allow_schema_wipe: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub log_dir: Option<String>,
    /// Filter expression handed to `init_logger`, e.g. `"info,oracle_node_core=debug"`.
    #[serde(default = "default_log_filters")]
    pub filters: String,
}

fn default_log_filters() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { log_dir: None, filters: default_log_filters() }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub keystore: KeystoreConfig,
    #[serde(default)]
    pub log_poller: LogPollerConfig,
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Raw `[profiles.<name>]` tables; applied by the loader, never read afterwards.
    #[serde(default, skip_serializing)]
    pub profiles: Option<Map<String, Dict>>,
}

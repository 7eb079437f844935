//! System-wide constants for the oracle node core.

/// Nanoseconds per second (10^9).
pub const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Env var that pins `now_nanos()` for deterministic tests.
pub const TEST_NOW_NANOS_ENV_VAR: &str = "ORACLE_NODE_TEST_NOW_NANOS";

/// Length of raw private key material for every supported key type.
pub const KEY_RAW_LEN: usize = 32;

/// Blake3 / Keccak hash size in bytes.
pub const HASH_SIZE: usize = 32;

/// EVM address size in bytes.
pub const ADDRESS_SIZE: usize = 20;

/// Current in-memory key ring schema version (serialized inside the encrypted blob).
pub const KEY_RING_VERSION: u32 = 1;

/// File name of the encrypted key ring inside the data dir.
pub const KEY_RING_FILE_NAME: &str = "keyring.bin";

/// Maximum time to wait for a storage mutex before failing.
pub const STORAGE_LOCK_TIMEOUT_SECS: u64 = 5;

/// Base backoff for an opened circuit breaker; doubled per consecutive open.
pub const CIRCUIT_BREAKER_BASE_BACKOFF_SECS: u64 = 1;

/// Default log poller tick.
pub const DEFAULT_POLL_PERIOD_MS: u64 = 3_000;

/// Default number of blocks behind latest that are treated as final.
pub const DEFAULT_FINALITY_DEPTH: u64 = 50;

/// Default batch size for ranged log queries below the finalized head.
pub const DEFAULT_BACKFILL_BATCH_SIZE: u64 = 100;

/// Default interval between prune passes.
pub const DEFAULT_PRUNE_PERIOD_SECS: u64 = 600;

/// Default attempts for a single chain client call before giving up for this tick.
pub const DEFAULT_RPC_RETRY_ATTEMPTS: usize = 3;

/// Default delay between chain client retries.
pub const DEFAULT_RPC_RETRY_DELAY_MS: u64 = 250;

/// Default JSON-RPC request timeout.
pub const DEFAULT_RPC_REQUEST_TIMEOUT_MS: u64 = 10_000;

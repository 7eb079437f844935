use oracle_node_core::infrastructure::config::{
    keystore_password_from_env, load_app_config_from_path, load_app_config_from_profile_path, KeystoreBackend, CONFIG_FILE_NAME,
    KEYSTORE_PASSWORD_ENV,
};
use oracle_node_core::NodeError;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use tempfile::TempDir;

const NODE_TOML: &str = r#"
[keystore]
backend = "rocksdb"

[keystore.kdf]
m_cost = 19456
t_cost = 2
p_cost = 1

[log_poller]
chain_id = 11155111
finality_depth = 12
backfill_batch_size = 500
keep_finalized_blocks_depth = 1000

[rpc]
endpoints = ["https://rpc-a.example", "", "https://rpc-b.example"]
retry_attempts = 5

[profiles.fast]
log_poller = { poll_period_ms = 500, use_finality_tag = true }
"#;

fn lock_env() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(())).lock().expect("env lock")
}

fn write_config(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join(CONFIG_FILE_NAME);
    std::fs::write(&path, contents).expect("write config");
    path
}

#[test]
fn test_config_loading_when_file_present_then_fields_and_defaults_apply() {
    let _guard = lock_env();
    let data_dir = TempDir::new().expect("temp data dir");
    let path = write_config(data_dir.path(), NODE_TOML);

    let config = load_app_config_from_path(&path, data_dir.path()).expect("load app config");

    assert_eq!(config.keystore.backend, KeystoreBackend::Rocks);
    assert_eq!(config.keystore.kdf.m_cost, 19456);
    assert_eq!(config.log_poller.chain_id, 11155111);
    assert_eq!(config.log_poller.finality_depth, 12);
    assert_eq!(config.log_poller.backfill_batch_size, 500);
    assert!(!config.log_poller.use_finality_tag);
    assert_eq!(config.rpc.endpoints, vec!["https://rpc-a.example".to_string(), "https://rpc-b.example".to_string()]);
    assert_eq!(config.rpc.retry_attempts, 5);
    assert_eq!(config.storage.data_dir, data_dir.path().to_string_lossy());
    assert!(config.profiles.is_none());
}

#[test]
fn test_config_loading_when_profile_selected_then_overrides_merge() {
    let _guard = lock_env();
    let data_dir = TempDir::new().expect("temp data dir");
    let path = write_config(data_dir.path(), NODE_TOML);

    let config = load_app_config_from_profile_path(&path, data_dir.path(), "fast").expect("load profile");

    assert_eq!(config.log_poller.poll_period_ms, 500);
    assert!(config.log_poller.use_finality_tag);
    assert_eq!(config.log_poller.finality_depth, 12);

    let err = load_app_config_from_profile_path(&path, data_dir.path(), "missing").expect_err("unknown profile");
    assert!(matches!(err, NodeError::ConfigError(_)));
}

#[test]
fn test_config_loading_when_env_set_then_env_wins_and_password_stays_out() {
    let _guard = lock_env();
    let data_dir = TempDir::new().expect("temp data dir");
    let path = write_config(data_dir.path(), NODE_TOML);

    env::set_var("ORACLE_NODE_LOG_POLLER__FINALITY_DEPTH", "64");
    env::set_var(KEYSTORE_PASSWORD_ENV, "  from-env  ");
    let config = load_app_config_from_path(&path, data_dir.path());
    let password = keystore_password_from_env();
    env::remove_var("ORACLE_NODE_LOG_POLLER__FINALITY_DEPTH");
    env::remove_var(KEYSTORE_PASSWORD_ENV);

    let config = config.expect("load with env");
    assert_eq!(config.log_poller.finality_depth, 64);
    assert_eq!(password.as_deref(), Some("from-env"));
}

#[test]
fn test_config_loading_when_invalid_then_every_problem_is_reported() {
    let _guard = lock_env();
    let data_dir = TempDir::new().expect("temp data dir");
    let path = write_config(
        data_dir.path(),
        r#"
        [keystore]
        backend = "rocks"
        path = "/tmp/keyring.bin"

        [log_poller]
        chain_id = 0

        [rpc]
        endpoints = ["ws://node:8546"]
        "#,
    );

    let err = load_app_config_from_path(&path, data_dir.path()).expect_err("invalid config");
    let NodeError::ConfigError(message) = err else {
        panic!("expected config error, got {err:?}");
    };
    assert!(message.contains("chain_id"));
    assert!(message.contains("ws://node:8546"));
    assert!(message.contains("keystore.path"));
}

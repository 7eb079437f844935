#[path = "keystore-admin/cli.rs"]
mod cli;

use crate::cli::{Cli, Command};
use log::{info, warn};
use oracle_node_core::domain::keys::{KeyKind, TypedKey};
use oracle_node_core::infrastructure::config::{self, AppConfig, KeystoreBackend};
use oracle_node_core::infrastructure::keys::passphrase::prompt_password;
use oracle_node_core::infrastructure::keys::{FileAuditLogger, FileKeyRingStore, KeyManager, KeyRingStore, Keystore, TypedKeyStore};
use oracle_node_core::infrastructure::logging::init_logger;
use oracle_node_core::infrastructure::storage::RocksStorage;
use oracle_node_core::NodeError;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use zeroize::Zeroizing;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Cli::parse_args();
    init_logger(None, &args.log_level)?;
    args.apply_to_env();

    let data_dir = config::resolve_data_dir()?;
    let app_config = load_config_or_default(&data_dir)?;
    let keystore = open_keystore(&app_config, &data_dir)?;

    let password = read_password("Keystore password: ")?;
    keystore.unlock(&password)?;

    match args.command {
        Command::Init => {
            println!("key ring ready backend={}", keystore.manager().backend());
        }
        Command::List { key_type } => {
            let kinds = key_type.map(|kind| vec![kind]).unwrap_or_else(|| KeyKind::ALL.to_vec());
            for kind in kinds {
                for_kind(&keystore, kind, KeyAction::List)?;
            }
        }
        Command::Create { key_type } => for_kind(&keystore, key_type, KeyAction::Create)?,
        Command::Ensure { key_type } => for_kind(&keystore, key_type, KeyAction::Ensure)?,
        Command::Delete { key_type, id } => for_kind(&keystore, key_type, KeyAction::Delete(id))?,
        Command::Export { key_type, id, out } => {
            let export_password = prompt_password("Export password: ")?;
            for_kind(&keystore, key_type, KeyAction::Export { id, out, password: export_password })?
        }
        Command::Import { key_type, file } => {
            let json = std::fs::read(&file)?;
            let export_password = prompt_password("Export password: ")?;
            for_kind(&keystore, key_type, KeyAction::Import { json, password: export_password })?
        }
    }

    keystore.lock();
    Ok(())
}

enum KeyAction {
    List,
    Create,
    Ensure,
    Delete(String),
    Export { id: String, out: Option<PathBuf>, password: Zeroizing<String> },
    Import { json: Vec<u8>, password: Zeroizing<String> },
}

fn for_kind(keystore: &Keystore, kind: KeyKind, action: KeyAction) -> Result<(), NodeError> {
    match kind {
        KeyKind::Workflow => apply(keystore.workflow(), action),
        KeyKind::Csa => apply(keystore.csa(), action),
        KeyKind::P2P => apply(keystore.p2p(), action),
        KeyKind::Eth => apply(keystore.eth(), action),
    }
}

fn apply<K: TypedKey>(store: TypedKeyStore<K>, action: KeyAction) -> Result<(), NodeError> {
    match action {
        KeyAction::List => {
            for key in store.get_all()? {
                println!("{}\t{}\t{}", K::KIND, key.id(), key.public_key_hex());
            }
        }
        KeyAction::Create => {
            let key = store.create()?;
            println!("created {} key {}", K::KIND, key.id());
        }
        KeyAction::Ensure => {
            store.ensure_key()?;
            let ids: Vec<String> = store.get_all()?.iter().map(|key| key.id().to_string()).collect();
            println!("{} keys: {}", K::KIND, ids.join(", "));
        }
        KeyAction::Delete(id) => {
            let key = store.delete(&id)?;
            println!("deleted {} key {}", K::KIND, key.id());
        }
        KeyAction::Export { id, out, password } => {
            let blob = store.export(&id, &password)?;
            match out {
                Some(path) => {
                    std::fs::write(&path, &blob).map_err(|e| oracle_node_core::storage_err!("write export", e))?;
                    info!("exported key key_type={} key_id={} path={}", K::KIND, id, path.display());
                }
                None => {
                    let mut stdout = std::io::stdout();
                    stdout.write_all(&blob).map_err(|e| oracle_node_core::storage_err!("write export", e))?;
                    stdout.write_all(b"\n").map_err(|e| oracle_node_core::storage_err!("write export", e))?;
                }
            }
        }
        KeyAction::Import { json, password } => {
            let key = store.import(&json, &password)?;
            println!("imported {} key {}", K::KIND, key.id());
        }
    }
    Ok(())
}

/// The config file is optional for key management; defaults apply when it is absent.
fn load_config_or_default(data_dir: &Path) -> Result<AppConfig, NodeError> {
    let config_path = config::resolve_config_path(data_dir)?;
    if config_path.exists() {
        info!("loading config path={}", config_path.display());
        return config::load_config_from_file(&config_path, data_dir);
    }
    warn!("config file not found, using defaults path={}", config_path.display());
    let mut app_config = AppConfig::default();
    app_config.storage.data_dir = data_dir.display().to_string();
    Ok(app_config)
}

fn open_keystore(app_config: &AppConfig, data_dir: &Path) -> Result<Keystore, NodeError> {
    let store: Arc<dyn KeyRingStore> = match app_config.keystore.backend {
        KeystoreBackend::File => match &app_config.keystore.path {
            Some(path) => Arc::new(FileKeyRingStore::new(path)),
            None => Arc::new(FileKeyRingStore::in_dir(data_dir)),
        },
        KeystoreBackend::Rocks => {
            Arc::new(RocksStorage::open_in_dir_with_options(data_dir, app_config.storage.allow_schema_wipe)?)
        }
    };
    let mut manager = KeyManager::new(store).with_kdf_params(app_config.keystore.kdf);
    if let Some(path) = &app_config.keystore.audit_log_path {
        manager = manager.with_audit_logger(Arc::new(FileAuditLogger::new(path)?));
    }
    Ok(Keystore::new(manager))
}

fn read_password(prompt: &str) -> Result<Zeroizing<String>, NodeError> {
    if let Some(password) = config::keystore_password_from_env() {
        return Ok(Zeroizing::new(password));
    }
    prompt_password(prompt)
}

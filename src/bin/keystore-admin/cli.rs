use clap::{Parser, Subcommand};
use oracle_node_core::domain::keys::KeyKind;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "keystore-admin")]
#[command(about = "Manage the oracle node's encrypted key ring", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override data directory
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,

    /// Log filters (e.g. "info", "oracle_node_core=debug")
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create an empty key ring, or check the password of an existing one
    Init,
    /// List key ids, optionally for one key type
    List { key_type: Option<KeyKind> },
    /// Generate a new key
    Create { key_type: KeyKind },
    /// Create a key of this type only if none exists yet
    Ensure { key_type: KeyKind },
    /// Delete a key
    Delete { key_type: KeyKind, id: String },
    /// Write a password-protected JSON export of a key
    Export {
        key_type: KeyKind,
        id: String,
        /// Output file; stdout when omitted
        out: Option<PathBuf>,
    },
    /// Import a key from a JSON export
    Import { key_type: KeyKind, file: PathBuf },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn apply_to_env(&self) {
        if let Some(config_path) = &self.config {
            std::env::set_var(oracle_node_core::infrastructure::config::CONFIG_PATH_ENV, config_path);
        }

        if let Some(data_dir) = &self.data_dir {
            std::env::set_var(oracle_node_core::infrastructure::config::DATA_DIR_ENV, data_dir);
        }
    }
}

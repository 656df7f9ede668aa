//! Daemon configuration.
//!
//! Sources, lowest to highest precedence: built-in defaults, JSON config
//! file, command-line flags, environment variables. A non-empty database DSN
//! selects the relational backend; otherwise the in-memory backend is used.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use ipnet::IpNet;
use serde::Deserialize;

use pulse_core::{PulseError, Result};

use crate::storage::MemoryStorageConfig;

const DEFAULT_ADDRESS: &str = "127.0.0.1:8080";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_STORE_INTERVAL_SECS: u64 = 300;
const DEFAULT_STORE_FILE: &str = "/tmp/metrics-db.json";

#[derive(Parser, Debug, Default)]
#[command(name = "pulsed")]
#[command(about = "PULSE metrics daemon", long_about = None)]
struct Cli {
    /// Listen address as "host:port"
    #[arg(short = 'a', long)]
    address: Option<String>,

    /// gRPC listen address as "host:port"
    #[arg(long)]
    grpc_address: Option<String>,

    /// Log level
    #[arg(short = 'l', long)]
    log_level: Option<String>,

    /// Snapshot interval in seconds; 0 snapshots on every write
    #[arg(short = 'i', long)]
    store_interval: Option<u64>,

    /// Snapshot file path
    #[arg(short = 'f', long)]
    store_file: Option<PathBuf>,

    /// Restore metrics from the snapshot file at start
    #[arg(short = 'r', long)]
    restore: Option<bool>,

    /// Database DSN; non-empty selects the relational backend
    #[arg(short = 'd', long)]
    database_dsn: Option<String>,

    /// HMAC key for report verification
    #[arg(short = 'k', long)]
    key: Option<String>,

    /// Path to a PEM file with the RSA private key for report decryption
    #[arg(long)]
    crypto_key: Option<PathBuf>,

    /// Trusted subnet CIDR
    #[arg(short = 't', long)]
    trusted_subnet: Option<String>,

    /// Path to a JSON file with daemon configuration
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct ConfigFile {
    address: Option<String>,
    grpc_address: Option<String>,
    restore: Option<bool>,
    store_interval: Option<u64>,
    store_file: Option<PathBuf>,
    database_dsn: Option<String>,
    key: Option<String>,
    crypto_key: Option<PathBuf>,
    log_level: Option<String>,
    trusted_subnet: Option<String>,
}

/// Resolved daemon configuration.
#[derive(Debug)]
pub struct DaemonConfig {
    pub address: String,
    pub grpc_address: Option<String>,
    pub log_level: String,
    pub key: Option<String>,
    pub crypto_key: Option<PathBuf>,
    pub trusted_subnet: Option<IpNet>,
    pub database_dsn: Option<String>,
    pub storage: MemoryStorageConfig,
}

impl DaemonConfig {
    /// Parse flags, then merge the config file and environment on top.
    pub fn load() -> Result<Self> {
        let cli = Cli::parse();
        let env: HashMap<String, String> = std::env::vars().collect();
        Self::merge(cli, &env)
    }

    fn merge(cli: Cli, env: &HashMap<String, String>) -> Result<Self> {
        let config_path = env.get("CONFIG").map(PathBuf::from).or(cli.config);

        let file = match config_path {
            Some(path) => {
                let content = std::fs::read_to_string(&path).map_err(|e| {
                    PulseError::InvalidConfig { reason: format!("failed to read {path:?}: {e}") }
                })?;
                serde_json::from_str::<ConfigFile>(&content).map_err(|e| {
                    PulseError::InvalidConfig { reason: format!("failed to parse {path:?}: {e}") }
                })?
            }
            None => ConfigFile::default(),
        };

        let address = env
            .get("ADDRESS")
            .cloned()
            .or(cli.address)
            .or(file.address)
            .unwrap_or_else(|| DEFAULT_ADDRESS.to_string());

        let grpc_address = env.get("GRPC_ADDRESS").cloned().or(cli.grpc_address).or(file.grpc_address);

        let log_level = env
            .get("LOG_LEVEL")
            .cloned()
            .or(cli.log_level)
            .or(file.log_level)
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        let store_interval = parse_env_u64(env, "STORE_INTERVAL")?
            .or(cli.store_interval)
            .or(file.store_interval)
            .unwrap_or(DEFAULT_STORE_INTERVAL_SECS);

        let store_file = env
            .get("FILE_STORAGE_PATH")
            .map(PathBuf::from)
            .or(cli.store_file)
            .or(file.store_file)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_FILE));

        let restore = parse_env_bool(env, "RESTORE")?
            .or(cli.restore)
            .or(file.restore)
            .unwrap_or(true);

        let database_dsn = env
            .get("DATABASE_DSN")
            .cloned()
            .or(cli.database_dsn)
            .or(file.database_dsn)
            .filter(|dsn| !dsn.is_empty());

        let key = env.get("KEY").cloned().or(cli.key).or(file.key).filter(|k| !k.is_empty());

        let crypto_key = env.get("CRYPTO_KEY").map(PathBuf::from).or(cli.crypto_key).or(file.crypto_key);

        let trusted_subnet = env
            .get("TRUSTED_SUBNET")
            .cloned()
            .or(cli.trusted_subnet)
            .or(file.trusted_subnet)
            .filter(|s| !s.is_empty())
            .map(|cidr| {
                cidr.parse::<IpNet>().map_err(|e| PulseError::InvalidConfig {
                    reason: format!("bad trusted subnet {cidr:?}: {e}"),
                })
            })
            .transpose()?;

        Ok(Self {
            address,
            grpc_address,
            log_level,
            key,
            crypto_key,
            trusted_subnet,
            database_dsn,
            storage: MemoryStorageConfig {
                store_interval: Duration::from_secs(store_interval),
                store_file: Some(store_file),
                restore,
            },
        })
    }
}

fn parse_env_u64(env: &HashMap<String, String>, name: &str) -> Result<Option<u64>> {
    match env.get(name) {
        Some(raw) => raw
            .parse::<u64>()
            .map(Some)
            .map_err(|e| PulseError::InvalidConfig { reason: format!("bad {name}: {e}") }),
        None => Ok(None),
    }
}

fn parse_env_bool(env: &HashMap<String, String>, name: &str) -> Result<Option<bool>> {
    match env.get(name) {
        Some(raw) => raw
            .parse::<bool>()
            .map(Some)
            .map_err(|e| PulseError::InvalidConfig { reason: format!("bad {name}: {e}") }),
        None => Ok(None),
    }
}

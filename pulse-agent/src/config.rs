//! Agent configuration.
//!
//! Sources, lowest to highest precedence: built-in defaults, JSON config
//! file, command-line flags, environment variables.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;

use pulse_core::{PulseError, Result};

const DEFAULT_ADDRESS: &str = "127.0.0.1:8080";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;
const DEFAULT_REPORT_INTERVAL_SECS: u64 = 10;

#[derive(Parser, Debug, Default)]
#[command(name = "pulse-agent")]
#[command(about = "PULSE metrics agent", long_about = None)]
struct Cli {
    /// Server address as "host:port"
    #[arg(short = 'a', long)]
    address: Option<String>,

    /// Server gRPC address as "host:port"
    #[arg(long)]
    grpc_address: Option<String>,

    /// Poll interval in seconds
    #[arg(short = 'p', long)]
    poll_interval: Option<u64>,

    /// Report interval in seconds
    #[arg(short = 'r', long)]
    report_interval: Option<u64>,

    /// HMAC key for report signing
    #[arg(short = 'k', long)]
    key: Option<String>,

    /// Path to a PEM file with the RSA public key for report encryption
    #[arg(long)]
    crypto_key: Option<PathBuf>,

    /// Path to a JSON file with agent configuration
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct ConfigFile {
    address: Option<String>,
    grpc_address: Option<String>,
    poll_interval: Option<u64>,
    report_interval: Option<u64>,
    key: Option<String>,
    crypto_key: Option<PathBuf>,
}

/// Which transport the run uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportTarget {
    Http(String),
    Grpc(String),
}

/// Resolved agent configuration.
#[derive(Debug)]
pub struct AgentConfig {
    pub target: TransportTarget,
    pub poll_interval: Duration,
    pub report_interval: Duration,
    pub key: Option<String>,
    pub crypto_key: Option<PathBuf>,
}

impl AgentConfig {
    /// Parse flags, then merge the config file and environment on top.
    pub fn load() -> Result<Self> {
        let cli = Cli::parse();
        let env: HashMap<String, String> = std::env::vars().collect();
        Self::merge(cli, &env)
    }

    fn merge(cli: Cli, env: &HashMap<String, String>) -> Result<Self> {
        let config_path = env
            .get("CONFIG")
            .map(PathBuf::from)
            .or(cli.config);

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
            .or(file.address);

        let grpc_address = env
            .get("GRPC_ADDRESS")
            .cloned()
            .or(cli.grpc_address)
            .or(file.grpc_address);

        let poll_secs = parse_env_u64(env, "POLL_INTERVAL")?
            .or(cli.poll_interval)
            .or(file.poll_interval)
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECS);

        let report_secs = parse_env_u64(env, "REPORT_INTERVAL")?
            .or(cli.report_interval)
            .or(file.report_interval)
            .unwrap_or(DEFAULT_REPORT_INTERVAL_SECS);

        let key = env.get("KEY").cloned().or(cli.key).or(file.key);
        let crypto_key = env
            .get("CRYPTO_KEY")
            .map(PathBuf::from)
            .or(cli.crypto_key)
            .or(file.crypto_key);

        let target = match (address, grpc_address) {
            (Some(_), Some(_)) => {
                return Err(PulseError::InvalidConfig {
                    reason: "at most one of address and grpc_address may be set".to_string(),
                })
            }
            (None, Some(grpc)) => TransportTarget::Grpc(grpc),
            (Some(http), None) => TransportTarget::Http(http),
            (None, None) => TransportTarget::Http(DEFAULT_ADDRESS.to_string()),
        };

        Ok(Self {
            target,
            poll_interval: Duration::from_secs(poll_secs),
            report_interval: Duration::from_secs(report_secs),
            key,
            crypto_key,
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

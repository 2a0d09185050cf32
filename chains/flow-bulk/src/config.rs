//! Configuration loader for flow-bulk

use crate::access_api::default_access_node;
use crate::cadence::normalize_address;
use anyhow::{Context, Result};
use core_logic::{ConfigError, SubmissionConfig};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Configuration for a bulk run against one Flow network
#[derive(Debug, Clone, Deserialize)]
pub struct FlowBulkConfig {
    /// Network name from flow.json (mainnet, testnet, emulator)
    #[serde(default = "default_network")]
    pub network: String,
    /// Signer alias from flow.json
    #[serde(default)]
    pub signer: String,
    /// Address of the signing account, used for sequence lookups
    #[serde(default)]
    pub account: String,
    /// Proposal key index on the signing account
    #[serde(default)]
    pub key_index: u32,
    /// Access REST endpoint, defaults per network
    #[serde(default)]
    pub access_node: Option<String>,
    /// Path to the flow CLI binary
    #[serde(default = "default_flow_bin")]
    pub flow_bin: String,
    /// Upper bound for one CLI invocation in seconds
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
    /// HTTP timeout for the Access API and metadata downloads in seconds
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_checkpoint_dir")]
    pub checkpoint_dir: String,
    #[serde(default)]
    pub submission: SubmissionConfig,
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub tiers: TiersConfig,
    #[serde(default)]
    pub sets: SetsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
    /// Child account whose NFTs are exchanged
    #[serde(default)]
    pub child_address: Option<String>,
    #[serde(default = "default_ids_script")]
    pub ids_script: PathBuf,
    #[serde(default = "default_exchange_tx")]
    pub tx_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TiersConfig {
    #[serde(default = "default_tiers_tx")]
    pub tx_path: PathBuf,
    #[serde(default = "default_mapping_file")]
    pub mapping_file: PathBuf,
    /// Takes precedence over `mapping_file` when set
    #[serde(default)]
    pub mapping_url: Option<String>,
}

/// Per-set jobs: default tiers and locking
#[derive(Debug, Clone, Deserialize)]
pub struct SetsConfig {
    #[serde(default = "default_default_tier_tx")]
    pub default_tier_tx: PathBuf,
    #[serde(default = "default_default_tier_file")]
    pub default_tier_file: PathBuf,
    /// Takes precedence over `default_tier_file` when set
    #[serde(default)]
    pub default_tier_url: Option<String>,
    #[serde(default = "default_lock_tx")]
    pub lock_tx: PathBuf,
    /// Inclusive ranges such as `1-73,75-99`
    #[serde(default)]
    pub lock_sets: Option<String>,
}

fn default_network() -> String {
    "mainnet".to_string()
}

fn default_flow_bin() -> String {
    "flow".to_string()
}

fn default_command_timeout() -> u64 {
    300
}

fn default_http_timeout() -> u64 {
    15
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_checkpoint_dir() -> String {
    "checkpoints".to_string()
}

fn default_ids_script() -> PathBuf {
    PathBuf::from("./topshot/scripts/get_collection_ids.cdc")
}

fn default_exchange_tx() -> PathBuf {
    PathBuf::from("./TSHOTExchange/transactions/exchangeNFTForTSHOT_child.cdc")
}

fn default_tiers_tx() -> PathBuf {
    PathBuf::from("./tiers/transactions/add_bulk_playid_tier.cdc")
}

fn default_mapping_file() -> PathBuf {
    PathBuf::from("open_set_play_tier_mapping.json")
}

fn default_default_tier_tx() -> PathBuf {
    PathBuf::from("./tiers/transactions/add_or_update_default_tier.cdc")
}

fn default_default_tier_file() -> PathBuf {
    PathBuf::from("default_tiers.json")
}

fn default_lock_tx() -> PathBuf {
    PathBuf::from("./topshot/transactions/lock_set.cdc")
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            child_address: None,
            ids_script: default_ids_script(),
            tx_path: default_exchange_tx(),
        }
    }
}

impl Default for TiersConfig {
    fn default() -> Self {
        Self {
            tx_path: default_tiers_tx(),
            mapping_file: default_mapping_file(),
            mapping_url: None,
        }
    }
}

impl Default for SetsConfig {
    fn default() -> Self {
        Self {
            default_tier_tx: default_default_tier_tx(),
            default_tier_file: default_default_tier_file(),
            default_tier_url: None,
            lock_tx: default_lock_tx(),
            lock_sets: None,
        }
    }
}

impl Default for FlowBulkConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            signer: String::new(),
            account: String::new(),
            key_index: 0,
            access_node: None,
            flow_bin: default_flow_bin(),
            command_timeout_secs: default_command_timeout(),
            http_timeout_secs: default_http_timeout(),
            log_dir: default_log_dir(),
            checkpoint_dir: default_checkpoint_dir(),
            submission: SubmissionConfig::default(),
            exchange: ExchangeConfig::default(),
            tiers: TiersConfig::default(),
            sets: SetsConfig::default(),
        }
    }
}

impl FlowBulkConfig {
    /// Load configuration from a TOML file
    ///
    /// # Example
    /// ```ignore
    /// let config = FlowBulkConfig::from_path("config/flow-bulk.toml")?;
    /// ```
    pub fn from_path(path: &str) -> Result<Self> {
        let content =
            fs::read_to_string(path).context(format!("Failed to read config from {}", path))?;
        toml::from_str(&content).context("Failed to parse config TOML")
    }

    /// Like [`from_path`](Self::from_path), but a missing file yields defaults
    /// so everything can come from the command line
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::from_path(path)
        } else {
            warn!("Config file {} not found, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Checks the fields every job needs
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.signer.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "signer".to_string(),
            });
        }
        if self.account.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "account".to_string(),
            });
        }
        normalize_address(&self.account)?;
        if self.command_timeout_secs == 0 {
            return Err(ConfigError::invalid("command_timeout_secs", "must be at least 1"));
        }
        self.access_node_url()?;
        self.submission.validate()
    }

    /// Normalized signing account address
    pub fn account_address(&self) -> Result<String, ConfigError> {
        normalize_address(&self.account)
    }

    /// Explicit `access_node`, or the well-known endpoint for `network`
    pub fn access_node_url(&self) -> Result<String, ConfigError> {
        if let Some(url) = self.access_node.as_deref().filter(|u| !u.trim().is_empty()) {
            return Ok(url.trim().to_string());
        }

        default_access_node(&self.network)
            .map(str::to_string)
            .ok_or_else(|| ConfigError::MissingField {
                field: format!("access_node (no default for network '{}')", self.network),
            })
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Checkpoint file for a job, e.g. `checkpoints/exchange-0x4ab8b294112f182c.json`
    pub fn checkpoint_path(&self, job: &str) -> PathBuf {
        Path::new(&self.checkpoint_dir).join(format!("{}.json", job))
    }
}

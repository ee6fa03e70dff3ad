//! Node configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use clipvote_types::VotingParams;

use crate::{LogFormat, NodeError};

/// Configuration shared by the hub and observers.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Port the hub listens on.
    #[serde(default = "default_hub_port")]
    pub hub_port: u16,

    /// WebSocket URL observers connect to.
    #[serde(default = "default_hub_url")]
    pub hub_url: String,

    /// Directory for the device-local lock store.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Fixed device identifier. Generated and persisted when absent.
    #[serde(default)]
    pub device_id: Option<String>,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Voting policy.
    #[serde(default)]
    pub voting: VotingParams,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_hub_port() -> u16 {
    7080
}

fn default_hub_url() -> String {
    "ws://127.0.0.1:7080/ws".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./clipvote_data")
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &std::path::Path) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        let config: Self = toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), NodeError> {
        self.voting
            .validate()
            .map_err(|e| NodeError::Config(e.to_string()))?;
        self.log_format()?;
        Ok(())
    }

    pub fn log_format(&self) -> Result<LogFormat, NodeError> {
        self.log_format.parse()
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            hub_port: default_hub_port(),
            hub_url: default_hub_url(),
            data_dir: default_data_dir(),
            device_id: None,
            log_format: default_log_format(),
            log_level: default_log_level(),
            voting: VotingParams::default(),
        }
    }
}

//! Node configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use gora_types::ProtocolParams;

use crate::logging::LogFormat;
use crate::NodeError;

/// Configuration for an oracle node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Directory holding the state snapshot.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Snapshot file name, relative to `data_dir` unless absolute.
    #[serde(default = "default_snapshot_file")]
    pub snapshot_file: PathBuf,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Whether to collect Prometheus metrics.
    #[serde(default)]
    pub enable_metrics: bool,

    /// Protocol parameters. A partial `[params]` table overrides only the
    /// fields it names.
    #[serde(default)]
    pub params: ProtocolParams,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_data_dir() -> PathBuf {
    PathBuf::from("./gora_data")
}

fn default_snapshot_file() -> PathBuf {
    PathBuf::from("state.bin")
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
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, NodeError> {
        let content = std::fs::read_to_string(path).map_err(|e| NodeError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    pub fn snapshot_path(&self) -> PathBuf {
        if self.snapshot_file.is_absolute() {
            self.snapshot_file.clone()
        } else {
            self.data_dir.join(&self.snapshot_file)
        }
    }

    pub fn log_format(&self) -> Result<LogFormat, NodeError> {
        self.log_format.parse()
    }

    /// Reject parameter combinations the engines cannot run with.
    pub fn validate(&self) -> Result<(), NodeError> {
        let p = &self.params;
        if p.voting_threshold == 0 || p.voting_threshold > 1000 {
            return Err(NodeError::Config(format!(
                "voting_threshold must be in 1..=1000, got {}",
                p.voting_threshold
            )));
        }
        if p.refund_request_made_percentage > 100 {
            return Err(NodeError::Config(format!(
                "refund_request_made_percentage must be at most 100, got {}",
                p.refund_request_made_percentage
            )));
        }
        // a pool rollover must never land inside the lock set by the previous one
        if p.pool_timeout < p.time_lock {
            return Err(NodeError::Config(format!(
                "pool_timeout ({}) must not be shorter than time_lock ({})",
                p.pool_timeout, p.time_lock
            )));
        }
        self.log_format()?;
        Ok(())
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            snapshot_file: default_snapshot_file(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            enable_metrics: false,
            params: ProtocolParams::default(),
        }
    }
}

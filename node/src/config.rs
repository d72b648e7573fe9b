//! Node configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use tally_types::WalletId;
use tally_work::MAX_DIFFICULTY;

use crate::NodeError;

/// Configuration for a tally node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Data directory for ledger storage.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// LMDB map size in MiB.
    #[serde(default = "default_map_size_mb")]
    pub map_size_mb: usize,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Leading zero hex digits required of a sealed block hash.
    #[serde(default = "default_difficulty")]
    pub difficulty: u32,

    /// Highest difficulty a commit request may ask for.
    #[serde(default = "default_max_difficulty")]
    pub max_difficulty: u32,

    /// Threads in the proof-of-work pool.
    #[serde(default = "default_work_threads")]
    pub work_threads: usize,

    /// Abort a nonce search after this many seconds; 0 means no limit.
    #[serde(default)]
    pub mining_timeout_secs: u64,

    #[serde(default)]
    pub enable_metrics: bool,

    #[serde(default)]
    pub levy: LevyConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevyConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_levy_period_secs")]
    pub period_secs: u64,

    #[serde(default = "default_levy_rate")]
    pub rate_per_mille: u64,

    /// Hex id of the wallet that receives levies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_wallet: Option<String>,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_data_dir() -> PathBuf {
    PathBuf::from("./tally_data")
}

fn default_map_size_mb() -> usize {
    1024
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_difficulty() -> u32 {
    5
}

fn default_max_difficulty() -> u32 {
    8
}

fn default_work_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn default_levy_period_secs() -> u64 {
    30 * 24 * 3600
}

fn default_levy_rate() -> u64 {
    25
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(e.to_string()))?;
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

    /// Reject settings the node cannot run with.
    pub fn validate(&self) -> Result<(), NodeError> {
        if self.max_difficulty > MAX_DIFFICULTY {
            return Err(NodeError::Config(format!(
                "max_difficulty {} exceeds {MAX_DIFFICULTY}",
                self.max_difficulty
            )));
        }
        if self.difficulty > self.max_difficulty {
            return Err(NodeError::Config(format!(
                "difficulty {} exceeds max_difficulty {}",
                self.difficulty, self.max_difficulty
            )));
        }
        if self.map_size_mb == 0 {
            return Err(NodeError::Config("map_size_mb must be positive".into()));
        }
        if self.levy.rate_per_mille > 1000 {
            return Err(NodeError::Config(format!(
                "levy rate {} per mille exceeds 1000",
                self.levy.rate_per_mille
            )));
        }
        if self.levy.enabled {
            if self.levy.period_secs == 0 {
                return Err(NodeError::Config("levy period_secs must be positive".into()));
            }
            self.levy.system_wallet_id()?;
        }
        Ok(())
    }

    pub fn map_size_bytes(&self) -> usize {
        self.map_size_mb.saturating_mul(1024 * 1024)
    }

    pub fn mining_timeout(&self) -> Option<Duration> {
        (self.mining_timeout_secs > 0).then(|| Duration::from_secs(self.mining_timeout_secs))
    }
}

impl LevyConfig {
    pub fn system_wallet_id(&self) -> Result<WalletId, NodeError> {
        let hex = self
            .system_wallet
            .as_deref()
            .ok_or_else(|| NodeError::Config("levy.system_wallet is not set".into()))?;
        hex.parse::<WalletId>()
            .map_err(|e| NodeError::Config(format!("levy.system_wallet: {e}")))
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }
}

impl Default for LevyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            period_secs: default_levy_period_secs(),
            rate_per_mille: default_levy_rate(),
            system_wallet: None,
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            map_size_mb: default_map_size_mb(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            difficulty: default_difficulty(),
            max_difficulty: default_max_difficulty(),
            work_threads: default_work_threads(),
            mining_timeout_secs: 0,
            enable_metrics: false,
            levy: LevyConfig::default(),
        }
    }
}

//! CLI Configuration.
//!
//! Configuration for the operator binary: where the deployment snapshot
//! lives, the protocol parameters a fresh deployment is built with, and the
//! oracle wiring. Loaded from a JSON file and overridden by `SYNTHEX_*`
//! environment variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::config::ProtocolParams;
use crate::utils::constants::*;
use crate::utils::crypto::Hash;

// ═══════════════════════════════════════════════════════════════════════════════
// CLI CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// CLI Configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Data directory (deployment snapshot, config file)
    pub data_dir: PathBuf,
    /// Over-collateralization multiplier for new deployments
    pub collateral_ratio: u64,
    /// Automated refresh interval in seconds
    pub update_interval_secs: u64,
    /// Oracle request fee
    pub oracle_fee: u64,
    /// Events retained per component
    pub max_events: usize,
    /// Data-provider API key
    pub api_key: Option<String>,
    /// Oracle job id as hex
    pub job_id: Option<String>,
    /// Symbols deployed by `init`
    pub assets: Vec<String>,
    /// Keeper poll cadence in seconds
    pub keeper_poll_secs: u64,
    /// Default tracing filter
    pub log_filter: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            collateral_ratio: DEFAULT_COLLATERAL_RATIO,
            update_interval_secs: DEFAULT_UPDATE_INTERVAL_SECS,
            oracle_fee: DEFAULT_ORACLE_FEE,
            max_events: DEFAULT_MAX_EVENTS,
            api_key: None,
            job_id: None,
            assets: vec!["TSLA".into(), "AAPL".into(), "MSFT".into()],
            keeper_poll_secs: 10,
            log_filter: "synthex=info".into(),
        }
    }
}

impl CliConfig {
    /// Load from file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;

        serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load from `path` if it exists, otherwise defaults; then apply the environment
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match path {
            Some(p) if p.exists() => Self::load(p)?,
            _ => {
                let default_path = Self::default_path();
                if default_path.exists() {
                    Self::load(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        let config = base.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Save to file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }

        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))
    }

    /// Load from environment variables
    pub fn from_env() -> Self {
        Self::default().apply_env(|key| std::env::var(key).ok())
    }

    /// Override fields from `SYNTHEX_*` variables looked up through `lookup`
    pub fn apply_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("SYNTHEX_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }

        if let Some(ratio) = lookup("SYNTHEX_COLLATERAL_RATIO").and_then(|v| v.parse().ok()) {
            self.collateral_ratio = ratio;
        }

        if let Some(secs) = lookup("SYNTHEX_UPDATE_INTERVAL").and_then(|v| v.parse().ok()) {
            self.update_interval_secs = secs;
        }

        if let Some(fee) = lookup("SYNTHEX_ORACLE_FEE").and_then(|v| v.parse().ok()) {
            self.oracle_fee = fee;
        }

        if let Some(key) = lookup("SYNTHEX_API_KEY") {
            self.api_key = Some(key);
        }

        if let Some(job) = lookup("SYNTHEX_JOB_ID") {
            self.job_id = Some(job);
        }

        if let Some(assets) = lookup("SYNTHEX_ASSETS") {
            self.assets = assets
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Some(filter) = lookup("SYNTHEX_LOG") {
            self.log_filter = filter;
        }

        self
    }

    /// Protocol parameters for a fresh deployment
    pub fn protocol_params(&self) -> ProtocolParams {
        ProtocolParams::default()
            .with_collateral_ratio(self.collateral_ratio)
            .with_update_interval(self.update_interval_secs)
            .with_oracle_fee(self.oracle_fee)
            .with_max_events(self.max_events)
    }

    /// Parsed oracle job id, if configured
    pub fn job_id_hash(&self) -> Result<Option<Hash>, ConfigError> {
        self.job_id
            .as_deref()
            .map(|s| Hash::from_hex(s).map_err(|e| ConfigError::Validation(format!("job_id: {}", e))))
            .transpose()
    }

    /// Path of the deployment snapshot
    pub fn state_path(&self) -> PathBuf {
        self.data_dir.join("deployment.bin")
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        default_data_dir().join("config.json")
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.protocol_params()
            .validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        if self.keeper_poll_secs == 0 {
            return Err(ConfigError::Validation("keeper poll interval must be greater than 0".into()));
        }

        if self.assets.iter().any(|s| s.is_empty()) {
            return Err(ConfigError::Validation("asset symbols cannot be empty".into()));
        }

        self.job_id_hash()?;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIG ERROR
// ═══════════════════════════════════════════════════════════════════════════════

/// Configuration error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(String),
    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),
    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

// ═══════════════════════════════════════════════════════════════════════════════
// HELPER FUNCTIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Get default data directory
fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".synthex");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join("Library/Application Support/synthex");
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("synthex");
        }
    }

    PathBuf::from(".synthex")
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

//! synthex Command Line Interface.
//!
//! Operator tooling around a locally persisted deployment: configuration,
//! output formatting and the snapshot store the binary reads and writes.

pub mod config;
pub mod output;

pub use config::*;
pub use output::*;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::protocol::deployment::{Deployment, DeploymentBuilder};
use crate::utils::crypto::Address;

// ═══════════════════════════════════════════════════════════════════════════════
// CLI ERROR
// ═══════════════════════════════════════════════════════════════════════════════

/// CLI Error types
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Protocol rejected the operation
    #[error("Protocol error: {0}")]
    Protocol(#[from] crate::error::Error),
    /// No deployment snapshot yet
    #[error("No deployment at {0}; run `synthex init` first")]
    NotInitialized(String),
    /// Snapshot already present
    #[error("Deployment already exists at {0}; pass --force to overwrite")]
    AlreadyInitialized(String),
    /// IO error
    #[error("IO error: {0}")]
    Io(String),
}

/// CLI Result type
pub type CliResult<T> = std::result::Result<T, CliError>;

// ═══════════════════════════════════════════════════════════════════════════════
// SNAPSHOT STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// Bincode snapshot of a [`Deployment`] on disk
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Store at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store for the configured data directory
    pub fn from_config(config: &CliConfig) -> Self {
        Self::new(config.state_path())
    }

    /// Snapshot path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a snapshot exists
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Build a fresh deployment from `config` and persist it
    pub fn init(&self, config: &CliConfig, owner: Address, now: u64, force: bool) -> CliResult<Deployment> {
        if self.exists() && !force {
            return Err(CliError::AlreadyInitialized(self.path.display().to_string()));
        }

        let mut builder = DeploymentBuilder::new(owner).params(config.protocol_params());
        if let Some(key) = &config.api_key {
            builder = builder.api_key(key.clone());
        }
        if let Some(job_id) = config.job_id_hash()? {
            builder = builder.job_id(job_id);
        }
        for symbol in &config.assets {
            builder = builder.asset(symbol.clone(), format!("Synthetic {}", symbol));
        }

        let deployment = builder.build(now)?;
        self.save(&deployment)?;
        Ok(deployment)
    }

    /// Load the snapshot
    pub fn load(&self) -> CliResult<Deployment> {
        if !self.exists() {
            return Err(CliError::NotInitialized(self.path.display().to_string()));
        }
        let bytes = std::fs::read(&self.path).map_err(|e| CliError::Io(e.to_string()))?;
        Ok(Deployment::from_bytes(&bytes)?)
    }

    /// Persist the snapshot
    pub fn save(&self, deployment: &Deployment) -> CliResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CliError::Io(e.to_string()))?;
        }
        let bytes = deployment.to_bytes()?;
        std::fs::write(&self.path, bytes).map_err(|e| CliError::Io(e.to_string()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Parse an identity given as `0x`-prefixed hex or as a label such as `alice`
pub fn parse_identity(s: &str) -> CliResult<Address> {
    if s.starts_with("0x") {
        return Ok(Address::from_hex(s)?);
    }
    if s.is_empty() {
        return Err(CliError::Protocol(crate::error::Error::EmptyString("identity")));
    }
    Ok(Address::from_label(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &Path) -> CliConfig {
        CliConfig {
            data_dir: dir.to_path_buf(),
            assets: vec!["TSLA".into()],
            ..CliConfig::default()
        }
    }

    #[test]
    fn test_store_init_load() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let store = StateStore::from_config(&config);
        let owner = Address::from_label("owner");

        assert!(matches!(store.load(), Err(CliError::NotInitialized(_))));

        let deployment = store.init(&config, owner, 0, false).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.state_hash(), deployment.state_hash());
        assert_eq!(loaded.tracker().unwrap().get_asset_list(), &["TSLA".to_string()]);

        assert!(matches!(
            store.init(&config, owner, 0, false),
            Err(CliError::AlreadyInitialized(_))
        ));
        assert!(store.init(&config, owner, 0, true).is_ok());
    }

    #[test]
    fn test_parse_identity() {
        let alice = parse_identity("alice").unwrap();
        assert_eq!(alice, Address::from_label("alice"));
        assert_eq!(parse_identity(&alice.to_hex()).unwrap(), alice);
        assert!(parse_identity("0xzz").is_err());
        assert!(parse_identity("").is_err());
    }
}

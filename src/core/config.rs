//! Protocol configuration and parameters.
//!
//! Parameters are fixed when a deployment is built. Wiring (addresses, API
//! keys, job ids) is changed afterwards only through owner-only setters on
//! the individual components.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::utils::constants::*;
use crate::utils::validation::validate_collateral_ratio;

// ═══════════════════════════════════════════════════════════════════════════════
// PROTOCOL PARAMETERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Deployment-time protocol parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolParams {
    /// Protocol version
    pub version: String,

    /// Over-collateralization multiplier applied on mint
    pub collateral_ratio: u64,

    /// Minimum seconds between automated price refreshes
    pub update_interval_secs: u64,

    /// Payment-token fee attached to each oracle request
    pub oracle_fee: u64,

    /// Events retained per component
    pub max_events: usize,
}

impl Default for ProtocolParams {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            collateral_ratio: DEFAULT_COLLATERAL_RATIO,
            update_interval_secs: DEFAULT_UPDATE_INTERVAL_SECS,
            oracle_fee: DEFAULT_ORACLE_FEE,
            max_events: DEFAULT_MAX_EVENTS,
        }
    }
}

impl ProtocolParams {
    /// Use a custom collateral ratio
    pub fn with_collateral_ratio(mut self, ratio: u64) -> Self {
        self.collateral_ratio = ratio;
        self
    }

    /// Use a custom refresh interval
    pub fn with_update_interval(mut self, secs: u64) -> Self {
        self.update_interval_secs = secs;
        self
    }

    /// Use a custom oracle fee
    pub fn with_oracle_fee(mut self, fee: u64) -> Self {
        self.oracle_fee = fee;
        self
    }

    /// Use a custom event history size
    pub fn with_max_events(mut self, max_events: usize) -> Self {
        self.max_events = max_events;
        self
    }

    /// Validate parameters are consistent
    pub fn validate(&self) -> Result<()> {
        validate_collateral_ratio(self.collateral_ratio)?;

        if self.update_interval_secs == 0 {
            return Err(Error::InvalidParameter {
                name: "update_interval_secs".into(),
                reason: "must be at least one second".into(),
            });
        }
        if self.max_events == 0 {
            return Err(Error::InvalidParameter {
                name: "max_events".into(),
                reason: "event history cannot be empty".into(),
            });
        }
        Ok(())
    }
}

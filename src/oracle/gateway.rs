//! Oracle network and stable-price feed interface.
//!
//! The price tracker never talks to a concrete oracle network. It hands an
//! [`OracleRequestPayload`] to an [`OracleGateway`] and later receives the
//! answer through `PriceTracker::fulfill`. The stable collateral price is read
//! synchronously from a feed aggregator through the same gateway.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::oracle::requests::RequestId;
use crate::utils::crypto::{Address, Hash};

// ═══════════════════════════════════════════════════════════════════════════════
// REQUEST PAYLOAD
// ═══════════════════════════════════════════════════════════════════════════════

/// Everything the oracle network needs to answer one asset-price request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleRequestPayload {
    /// Oracle node expected to fulfill
    pub oracle: Address,
    /// Job specification id
    pub job_id: Hash,
    /// Data-provider API key
    pub api_key: String,
    /// Asset symbol
    pub symbol: String,
    /// Id the fulfillment must echo back
    pub request_id: RequestId,
    /// Payment-token fee attached to the request
    pub fee: u64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// GATEWAY INTERFACE
// ═══════════════════════════════════════════════════════════════════════════════

/// Outbound calls from the price tracker to its external feeds
pub trait OracleGateway {
    /// Send an asset-price request to the oracle network
    fn dispatch(&mut self, payload: &OracleRequestPayload) -> Result<()>;

    /// Latest answer of the stable-price aggregator at `aggregator`
    fn latest_stable_answer(&self, aggregator: &Address) -> Result<i128>;
}

/// Mock implementation for testing
#[derive(Debug, Clone, Default)]
pub struct MockOracleGateway {
    /// Requests dispatched so far
    pub dispatched: Vec<OracleRequestPayload>,
    /// Answer returned by the stable feed
    pub stable_answer: i128,
    /// When set, every call fails with this message
    pub failure: Option<String>,
}

impl MockOracleGateway {
    /// Create a gateway whose stable feed answers `stable_answer`
    pub fn new(stable_answer: i128) -> Self {
        Self {
            stable_answer,
            ..Self::default()
        }
    }

    /// Make every subsequent call fail
    pub fn fail_with(&mut self, message: impl Into<String>) {
        self.failure = Some(message.into());
    }

    /// Most recent dispatched request
    pub fn last_request(&self) -> Option<&OracleRequestPayload> {
        self.dispatched.last()
    }

    /// Dispatched requests for `symbol`
    pub fn requests_for(&self, symbol: &str) -> Vec<&OracleRequestPayload> {
        self.dispatched.iter().filter(|p| p.symbol == symbol).collect()
    }

    fn check(&self) -> Result<()> {
        match &self.failure {
            Some(message) => Err(Error::External(message.clone())),
            None => Ok(()),
        }
    }
}

impl OracleGateway for MockOracleGateway {
    fn dispatch(&mut self, payload: &OracleRequestPayload) -> Result<()> {
        self.check()?;
        self.dispatched.push(payload.clone());
        Ok(())
    }

    fn latest_stable_answer(&self, aggregator: &Address) -> Result<i128> {
        self.check()?;
        if aggregator.is_zero() {
            return Err(Error::NotConfigured("aggregator".into()));
        }
        Ok(self.stable_answer)
    }
}

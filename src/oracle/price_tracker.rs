//! Price tracker.
//!
//! Caches one price per supported asset plus the stable collateral price.
//! Asset prices arrive asynchronously: a refresh records a pending request
//! and dispatches it to the oracle network, and the registered oracle later
//! fulfills it. The stable price is read synchronously from a feed aggregator.
//!
//! Per-asset lifecycle: `Unregistered → Registered(0) → Registered(p)`.
//! Assets are never removed and prices are never reset.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::token::TokenLedger;
use crate::error::{Error, Result};
use crate::oracle::gateway::{OracleGateway, OracleRequestPayload};
use crate::oracle::requests::{OracleRequest, OracleResult, PendingRequests, RequestId};
use crate::protocol::events::{EventLog, ProtocolEvent};
use crate::utils::circuit_breaker::CircuitBreaker;
use crate::utils::constants::{DEFAULT_ORACLE_FEE, DEFAULT_UPDATE_INTERVAL_SECS};
use crate::utils::crypto::{Address, Hash};
use crate::utils::validation::*;

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Construction parameters of a [`PriceTracker`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceTrackerConfig {
    /// Token used to pay oracle fees
    pub payment_token: Address,
    /// Stable-price feed aggregator
    pub aggregator: Address,
    /// Oracle node allowed to fulfill requests
    pub oracle: Address,
    /// Oracle job specification id
    pub job_id: Hash,
    /// Data-provider API key
    pub api_key: String,
    /// Fee attached to each oracle request
    pub fee: u64,
    /// Minimum seconds between automated refreshes
    pub update_interval: u64,
}

impl PriceTrackerConfig {
    /// Config with default fee and interval
    pub fn new(
        payment_token: Address,
        aggregator: Address,
        oracle: Address,
        job_id: Hash,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            payment_token,
            aggregator,
            oracle,
            job_id,
            api_key: api_key.into(),
            fee: DEFAULT_ORACLE_FEE,
            update_interval: DEFAULT_UPDATE_INTERVAL_SECS,
        }
    }

    /// Validate all fields
    pub fn validate(&self) -> Result<()> {
        validate_address(&self.payment_token, "payment token")?;
        validate_address(&self.aggregator, "aggregator")?;
        validate_address(&self.oracle, "oracle")?;
        validate_job_id(&self.job_id)?;
        validate_non_empty(&self.api_key, "api key")?;
        validate_update_interval(self.update_interval)?;
        Ok(())
    }
}

fn validate_job_id(job_id: &Hash) -> Result<()> {
    if job_id.is_zero() {
        return Err(Error::EmptyString("job id"));
    }
    Ok(())
}

fn validate_update_interval(interval: u64) -> Result<()> {
    if interval == 0 {
        return Err(Error::InvalidParameter {
            name: "update_interval".into(),
            reason: "must be at least one second".into(),
        });
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// PRICE TRACKER
// ═══════════════════════════════════════════════════════════════════════════════

/// Price cache fed by the oracle round-trip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceTracker {
    /// Tracker identity (requester of oracle jobs, holder of fee tokens)
    address: Address,
    /// Administrator
    owner: Address,
    /// Coordinating hub, allowed to register assets
    hub: Option<Address>,
    /// Automation registry, allowed to trigger refreshes
    keepers_registry: Option<Address>,
    /// External wiring
    config: PriceTrackerConfig,
    /// Timestamp of the last upkeep (deployment time initially)
    last_upkeep: u64,
    /// Pause switch for automated refreshes
    breaker: CircuitBreaker,
    /// Supported assets in registration order
    assets: Vec<String>,
    /// Cached asset prices
    prices: HashMap<String, u64>,
    /// Cached stable collateral price
    usdc_price: u64,
    /// Requests awaiting fulfillment
    pending: PendingRequests,
    /// Counter feeding request id derivation
    nonce: u64,
    /// Event history
    events: EventLog,
}

impl PriceTracker {
    /// Deploy a tracker at `address`, administered by `owner`
    pub fn new(address: Address, owner: Address, config: PriceTrackerConfig, now: u64) -> Result<Self> {
        validate_address(&address, "tracker")?;
        validate_address(&owner, "owner")?;
        config.validate()?;

        Ok(Self {
            address,
            owner,
            hub: None,
            keepers_registry: None,
            config,
            last_upkeep: now,
            breaker: CircuitBreaker::new(),
            assets: Vec::new(),
            prices: HashMap::new(),
            usdc_price: 0,
            pending: PendingRequests::new(),
            nonce: 0,
            events: EventLog::new(),
        })
    }

    /// Use a bounded event history of `max_events`
    pub fn with_event_capacity(mut self, max_events: usize) -> Self {
        self.events = EventLog::with_capacity(max_events);
        self
    }

    fn only_owner(&self, caller: &Address) -> Result<()> {
        require_role(caller, &[Some(self.owner)], "owner")
    }

    fn only_owner_or_hub(&self, caller: &Address) -> Result<()> {
        require_role(caller, &[Some(self.owner), self.hub], "owner or hub")
    }

    fn only_owner_or_automation(&self, caller: &Address) -> Result<()> {
        require_role(
            caller,
            &[Some(self.owner), self.keepers_registry],
            "owner or keepers registry",
        )
    }

    fn ensure_registered(&self, symbol: &str) -> Result<()> {
        if !self.prices.contains_key(symbol) {
            return Err(Error::NotRegistered(symbol.to_string()));
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ASSET REGISTRATION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Append `symbol` to the supported list with price 0
    pub fn add_asset(&mut self, caller: &Address, symbol: &str) -> Result<()> {
        validate_non_empty(symbol, "symbol")?;
        self.only_owner_or_hub(caller)?;

        if self.prices.contains_key(symbol) {
            return Err(Error::AlreadyRegistered(symbol.to_string()));
        }

        self.assets.push(symbol.to_string());
        self.prices.insert(symbol.to_string(), 0);
        self.events.push(ProtocolEvent::AssetAdded {
            symbol: symbol.to_string(),
        });
        tracing::info!(symbol, "asset registered");
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // PRICE REFRESH
    // ═══════════════════════════════════════════════════════════════════════════

    /// Read the stable-price feed and overwrite the cached stable price
    pub fn update_usdc_price(&mut self, caller: &Address, gateway: &dyn OracleGateway) -> Result<u64> {
        self.only_owner_or_automation(caller)?;

        let price = self.read_stable_price(gateway)?;
        self.apply_usdc_price(price);
        Ok(price)
    }

    /// Issue an oracle request for `symbol`; the price is unchanged until fulfillment
    pub fn update_asset_price(
        &mut self,
        caller: &Address,
        symbol: &str,
        gateway: &mut dyn OracleGateway,
        now: u64,
    ) -> Result<RequestId> {
        validate_non_empty(symbol, "symbol")?;
        self.only_owner_or_automation(caller)?;
        self.ensure_registered(symbol)?;

        let request = self.dispatch_request(symbol, self.nonce, gateway, now)?;
        let request_id = request.request_id;
        self.record_request(request);
        Ok(request_id)
    }

    /// Apply the oracle's answer to a pending request
    pub fn fulfill(&mut self, caller: &Address, request_id: &RequestId, result: &OracleResult) -> Result<u64> {
        require_role(caller, &[Some(self.config.oracle)], "oracle")?;

        if !self.pending.contains(request_id) {
            return Err(Error::UnknownRequest(request_id.to_hex()));
        }
        let price = result.decode()?;
        let request = self.pending.consume(request_id)?;

        self.prices.insert(request.symbol.clone(), price);
        tracing::info!(symbol = %request.symbol, price, request = %request_id, "price fulfilled");
        self.events.push(ProtocolEvent::PriceFulfilled {
            request_id: *request_id,
            symbol: request.symbol,
            price,
        });
        Ok(price)
    }

    fn read_stable_price(&self, gateway: &dyn OracleGateway) -> Result<u64> {
        let answer = gateway.latest_stable_answer(&self.config.aggregator)?;
        u64::try_from(answer)
            .map_err(|_| Error::InvalidPrice(format!("stable feed answered {}", answer)))
    }

    fn apply_usdc_price(&mut self, price: u64) {
        self.usdc_price = price;
        self.events.push(ProtocolEvent::StablePriceUpdated { price });
        tracing::debug!(price, "stable price updated");
    }

    fn dispatch_request(
        &self,
        symbol: &str,
        nonce: u64,
        gateway: &mut dyn OracleGateway,
        now: u64,
    ) -> Result<OracleRequest> {
        let request_id = RequestId::derive(&self.address, nonce, symbol);
        let payload = OracleRequestPayload {
            oracle: self.config.oracle,
            job_id: self.config.job_id,
            api_key: self.config.api_key.clone(),
            symbol: symbol.to_string(),
            request_id,
            fee: self.config.fee,
        };
        gateway.dispatch(&payload)?;

        Ok(OracleRequest {
            request_id,
            symbol: symbol.to_string(),
            created_at: now,
        })
    }

    fn record_request(&mut self, request: OracleRequest) {
        self.nonce += 1;
        tracing::debug!(symbol = %request.symbol, request = %request.request_id, "oracle request issued");
        self.events.push(ProtocolEvent::PriceRequested {
            request_id: request.request_id,
            symbol: request.symbol.clone(),
        });
        self.pending.insert(request);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // AUTOMATION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Whether the update interval has elapsed since the last upkeep
    pub fn check_upkeep(&self, now: u64) -> bool {
        now.saturating_sub(self.last_upkeep) > self.config.update_interval
    }

    /// Refresh every registered asset and the stable price
    ///
    /// The stable feed is read before anything is dispatched. Each request is
    /// recorded as pending once the oracle network has accepted it, so a
    /// dispatch failure part-way leaves the earlier requests fulfillable. The
    /// stable price and upkeep time are only committed when every dispatch
    /// succeeded.
    pub fn perform_upkeep(
        &mut self,
        caller: &Address,
        gateway: &mut dyn OracleGateway,
        now: u64,
    ) -> Result<Vec<RequestId>> {
        self.only_owner_or_automation(caller)?;
        self.breaker.ensure_running()?;

        if !self.check_upkeep(now) {
            return Err(Error::UpkeepNotNeeded {
                elapsed: now.saturating_sub(self.last_upkeep),
                interval: self.config.update_interval,
            });
        }

        let usdc_price = self.read_stable_price(gateway)?;

        let symbols = self.assets.clone();
        let mut ids = Vec::with_capacity(symbols.len());
        for symbol in &symbols {
            match self.dispatch_request(symbol, self.nonce, gateway, now) {
                Ok(request) => {
                    ids.push(request.request_id);
                    self.record_request(request);
                }
                Err(e) => {
                    tracing::warn!(
                        symbol = %symbol,
                        dispatched = ids.len(),
                        error = %e,
                        "upkeep dispatch failed"
                    );
                    return Err(e);
                }
            }
        }

        self.apply_usdc_price(usdc_price);
        self.last_upkeep = now;

        self.events.push(ProtocolEvent::UpkeepPerformed {
            timestamp: now,
            requests: ids.len(),
        });
        tracing::info!(timestamp = now, requests = ids.len(), "upkeep performed");
        Ok(ids)
    }

    /// Stop automated refreshes
    pub fn pause(&mut self, caller: &Address, now: u64) -> Result<()> {
        self.only_owner(caller)?;
        self.breaker.pause(now)?;
        self.events.push(ProtocolEvent::Paused { by: *caller });
        tracing::warn!(by = %caller, "price tracker paused");
        Ok(())
    }

    /// Resume automated refreshes
    pub fn unpause(&mut self, caller: &Address) -> Result<()> {
        self.only_owner(caller)?;
        self.breaker.unpause()?;
        self.events.push(ProtocolEvent::Unpaused { by: *caller });
        tracing::info!(by = %caller, "price tracker resumed");
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // OWNER OVERRIDES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Set an asset price directly
    pub fn set_asset_price(&mut self, caller: &Address, symbol: &str, price: u64) -> Result<()> {
        validate_non_empty(symbol, "symbol")?;
        self.only_owner(caller)?;
        self.ensure_registered(symbol)?;

        self.prices.insert(symbol.to_string(), price);
        self.events.push(ProtocolEvent::PriceOverridden {
            symbol: Some(symbol.to_string()),
            price,
        });
        tracing::warn!(symbol, price, "asset price overridden");
        Ok(())
    }

    /// Set the stable collateral price directly
    pub fn set_usdc_price(&mut self, caller: &Address, price: u64) -> Result<()> {
        self.only_owner(caller)?;

        self.usdc_price = price;
        self.events.push(ProtocolEvent::PriceOverridden { symbol: None, price });
        tracing::warn!(price, "stable price overridden");
        Ok(())
    }

    /// Drain the tracker's fee-token balance to the owner
    pub fn withdraw(&mut self, caller: &Address, token: &mut dyn TokenLedger) -> Result<u64> {
        self.only_owner(caller)?;

        if token.address() != self.config.payment_token {
            return Err(Error::UnknownComponent {
                kind: "payment token",
                address: token.address().to_hex(),
            });
        }

        let balance = token.balance_of(&self.address);
        if balance > 0 {
            token.transfer(&self.address, &self.owner, balance)?;
        }
        tracing::info!(amount = balance, "fee tokens withdrawn");
        Ok(balance)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // WIRING
    // ═══════════════════════════════════════════════════════════════════════════

    fn address_updated(&mut self, slot: &str, address: Address) {
        self.events.push(ProtocolEvent::AddressUpdated {
            slot: slot.to_string(),
            address,
        });
        tracing::info!(slot, %address, "price tracker address updated");
    }

    /// Set the hub address
    pub fn set_hub_address(&mut self, caller: &Address, hub: Address) -> Result<()> {
        validate_address(&hub, "hub")?;
        self.only_owner(caller)?;
        self.hub = Some(hub);
        self.address_updated("hub", hub);
        Ok(())
    }

    /// Set the stable-price aggregator
    pub fn set_aggregator_address(&mut self, caller: &Address, aggregator: Address) -> Result<()> {
        validate_address(&aggregator, "aggregator")?;
        self.only_owner(caller)?;
        self.config.aggregator = aggregator;
        self.address_updated("aggregator", aggregator);
        Ok(())
    }

    /// Set the automation registry
    pub fn set_keepers_registry_address(&mut self, caller: &Address, registry: Address) -> Result<()> {
        validate_address(&registry, "keepers registry")?;
        self.only_owner(caller)?;
        self.keepers_registry = Some(registry);
        self.address_updated("keepers_registry", registry);
        Ok(())
    }

    /// Set the oracle node allowed to fulfill
    pub fn set_oracle_address(&mut self, caller: &Address, oracle: Address) -> Result<()> {
        validate_address(&oracle, "oracle")?;
        self.only_owner(caller)?;
        self.config.oracle = oracle;
        self.address_updated("oracle", oracle);
        Ok(())
    }

    /// Set the data-provider API key
    pub fn set_api_key(&mut self, caller: &Address, api_key: &str) -> Result<()> {
        validate_non_empty(api_key, "api key")?;
        self.only_owner(caller)?;
        self.config.api_key = api_key.to_string();
        tracing::info!("api key updated");
        Ok(())
    }

    /// Set the oracle job id
    pub fn set_job_id(&mut self, caller: &Address, job_id: Hash) -> Result<()> {
        validate_job_id(&job_id)?;
        self.only_owner(caller)?;
        self.config.job_id = job_id;
        tracing::info!(job_id = %job_id, "job id updated");
        Ok(())
    }

    /// Set the automated refresh interval
    pub fn set_update_interval(&mut self, caller: &Address, interval: u64) -> Result<()> {
        validate_update_interval(interval)?;
        self.only_owner(caller)?;
        self.config.update_interval = interval;
        tracing::info!(interval, "update interval changed");
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Tracker address
    pub fn address(&self) -> Address {
        self.address
    }

    /// Owner address
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Hub address, if set
    pub fn hub(&self) -> Option<Address> {
        self.hub
    }

    /// Automation registry, if set
    pub fn keepers_registry(&self) -> Option<Address> {
        self.keepers_registry
    }

    /// Current wiring
    pub fn config(&self) -> &PriceTrackerConfig {
        &self.config
    }

    /// Cached price of a registered asset
    pub fn get_asset_price(&self, symbol: &str) -> Result<u64> {
        self.prices
            .get(symbol)
            .copied()
            .ok_or_else(|| Error::NotRegistered(symbol.to_string()))
    }

    /// Cached stable collateral price
    pub fn get_usdc_price(&self) -> u64 {
        self.usdc_price
    }

    /// Supported assets in registration order
    pub fn get_asset_list(&self) -> &[String] {
        &self.assets
    }

    /// Whether `symbol` is registered
    pub fn is_registered(&self, symbol: &str) -> bool {
        self.prices.contains_key(symbol)
    }

    /// Requests awaiting fulfillment
    pub fn pending_requests(&self) -> &PendingRequests {
        &self.pending
    }

    /// Whether automated refreshes are paused
    pub fn is_paused(&self) -> bool {
        self.breaker.is_paused()
    }

    /// Pause switch statistics
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Timestamp of the last upkeep
    pub fn last_upkeep(&self) -> u64 {
        self.last_upkeep
    }

    /// Event history
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SERIALIZATION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Serialize to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| Error::Deserialization(e.to_string()))
    }

    /// Compute state hash over the cached prices
    pub fn state_hash(&self) -> Hash {
        let mut data = Vec::new();
        data.extend_from_slice(self.address.as_bytes());
        data.extend_from_slice(&self.usdc_price.to_be_bytes());
        for symbol in &self.assets {
            data.extend_from_slice(symbol.as_bytes());
            data.extend_from_slice(&self.prices.get(symbol).copied().unwrap_or(0).to_be_bytes());
        }
        data.extend_from_slice(&self.nonce.to_be_bytes());
        data.extend_from_slice(&[self.breaker.is_paused() as u8]);
        Hash::sha256(&data)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

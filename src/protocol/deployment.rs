//! Deployment wiring.
//!
//! A [`Deployment`] owns one hub plus a [`ComponentRegistry`] holding every
//! vault, price tracker, supply ledger and token keyed by address. The
//! registry is what the hub talks to through [`HubCollaborators`]; keeping the
//! hub outside the registry lets a mint borrow both mutably at once.
//!
//! [`DeploymentBuilder`] wires the canonical setup: one stable collateral
//! token, one vault, one tracker, one ledger per symbol, all pointing at the
//! hub.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::core::config::ProtocolParams;
use crate::core::hub::{HubCollaborators, ProtocolHub};
use crate::core::synth::SynthSupplyLedger;
use crate::core::token::{BalanceToken, TokenLedger};
use crate::core::vault::CollateralVault;
use crate::error::{Error, Result};
use crate::oracle::gateway::OracleGateway;
use crate::oracle::price_tracker::{PriceTracker, PriceTrackerConfig};
use crate::oracle::requests::{OracleResult, RequestId};
use crate::utils::crypto::{Address, Hash};
use crate::utils::validation::{validate_address, validate_non_empty};

// ═══════════════════════════════════════════════════════════════════════════════
// COMPONENT REGISTRY
// ═══════════════════════════════════════════════════════════════════════════════

/// Every deployed component other than the hub, keyed by address
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComponentRegistry {
    vaults: HashMap<Address, CollateralVault>,
    trackers: HashMap<Address, PriceTracker>,
    ledgers: HashMap<Address, SynthSupplyLedger>,
    tokens: HashMap<Address, BalanceToken>,
}

fn unknown(kind: &'static str, address: &Address) -> Error {
    Error::UnknownComponent {
        kind,
        address: address.to_hex(),
    }
}

impl ComponentRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a vault
    pub fn insert_vault(&mut self, vault: CollateralVault) {
        self.vaults.insert(vault.address(), vault);
    }

    /// Register a price tracker
    pub fn insert_tracker(&mut self, tracker: PriceTracker) {
        self.trackers.insert(tracker.address(), tracker);
    }

    /// Register a supply ledger
    pub fn insert_ledger(&mut self, ledger: SynthSupplyLedger) {
        self.ledgers.insert(ledger.address(), ledger);
    }

    /// Register a token
    pub fn insert_token(&mut self, token: BalanceToken) {
        self.tokens.insert(token.address(), token);
    }

    /// Vault at `address`
    pub fn vault(&self, address: &Address) -> Result<&CollateralVault> {
        self.vaults.get(address).ok_or_else(|| unknown("vault", address))
    }

    /// Mutable vault at `address`
    pub fn vault_mut(&mut self, address: &Address) -> Result<&mut CollateralVault> {
        self.vaults.get_mut(address).ok_or_else(|| unknown("vault", address))
    }

    /// Tracker at `address`
    pub fn tracker(&self, address: &Address) -> Result<&PriceTracker> {
        self.trackers.get(address).ok_or_else(|| unknown("price tracker", address))
    }

    /// Mutable tracker at `address`
    pub fn tracker_mut(&mut self, address: &Address) -> Result<&mut PriceTracker> {
        self.trackers
            .get_mut(address)
            .ok_or_else(|| unknown("price tracker", address))
    }

    /// Ledger at `address`
    pub fn ledger(&self, address: &Address) -> Result<&SynthSupplyLedger> {
        self.ledgers.get(address).ok_or_else(|| unknown("synth ledger", address))
    }

    /// Mutable ledger at `address`
    pub fn ledger_mut(&mut self, address: &Address) -> Result<&mut SynthSupplyLedger> {
        self.ledgers
            .get_mut(address)
            .ok_or_else(|| unknown("synth ledger", address))
    }

    /// Token at `address`
    pub fn token(&self, address: &Address) -> Result<&BalanceToken> {
        self.tokens.get(address).ok_or_else(|| unknown("token", address))
    }

    /// Mutable token at `address`
    pub fn token_mut(&mut self, address: &Address) -> Result<&mut BalanceToken> {
        self.tokens.get_mut(address).ok_or_else(|| unknown("token", address))
    }

    /// Deposit into the vault at `vault` using its configured collateral token
    pub fn deposit(&mut self, vault: &Address, caller: &Address, amount: u64) -> Result<u64> {
        let vault = self.vaults.get_mut(vault).ok_or_else(|| unknown("vault", vault))?;
        let token_addr = vault.collateral_token();
        let token = self
            .tokens
            .get_mut(&token_addr)
            .ok_or_else(|| unknown("token", &token_addr))?;
        vault.deposit(caller, amount, token)
    }

    /// Withdraw from the vault at `vault` using its configured collateral token
    pub fn withdraw(&mut self, vault: &Address, caller: &Address, amount: u64) -> Result<u64> {
        let vault = self.vaults.get_mut(vault).ok_or_else(|| unknown("vault", vault))?;
        let token_addr = vault.collateral_token();
        let token = self
            .tokens
            .get_mut(&token_addr)
            .ok_or_else(|| unknown("token", &token_addr))?;
        vault.withdraw(caller, amount, token)
    }

    /// Drain the tracker's fee tokens to its owner
    pub fn withdraw_fees(&mut self, tracker: &Address, caller: &Address) -> Result<u64> {
        let tracker = self
            .trackers
            .get_mut(tracker)
            .ok_or_else(|| unknown("price tracker", tracker))?;
        let token_addr = tracker.config().payment_token;
        let token = self
            .tokens
            .get_mut(&token_addr)
            .ok_or_else(|| unknown("token", &token_addr))?;
        tracker.withdraw(caller, token)
    }

    /// Check the accounting invariants of every component
    pub fn verify_invariants(&self) -> bool {
        let vaults_ok = self.vaults.values().all(|v| {
            v.verify_invariant()
                && self
                    .tokens
                    .get(&v.collateral_token())
                    .map(|t| v.is_backed_by(t))
                    .unwrap_or(false)
        });

        vaults_ok
            && self.ledgers.values().all(|l| l.verify_supply_invariant())
            && self.tokens.values().all(|t| t.verify_supply_invariant())
    }

    /// Combined hash of every component, in address order
    pub fn state_hash(&self) -> Hash {
        let mut data = Vec::new();

        let mut vaults: Vec<_> = self.vaults.values().collect();
        vaults.sort_by_key(|v| v.address());
        for v in vaults {
            data.extend_from_slice(v.state_hash().as_bytes());
        }

        let mut trackers: Vec<_> = self.trackers.values().collect();
        trackers.sort_by_key(|t| t.address());
        for t in trackers {
            data.extend_from_slice(t.state_hash().as_bytes());
        }

        let mut ledgers: Vec<_> = self.ledgers.values().collect();
        ledgers.sort_by_key(|l| l.address());
        for l in ledgers {
            data.extend_from_slice(l.state_hash().as_bytes());
        }

        let mut tokens: Vec<_> = self.tokens.values().collect();
        tokens.sort_by_key(|t| t.address());
        for t in tokens {
            data.extend_from_slice(t.state_hash().as_bytes());
        }

        Hash::sha256(&data)
    }
}

impl HubCollaborators for ComponentRegistry {
    fn collateral_amount(&self, vault: &Address, user: &Address) -> Result<u64> {
        Ok(self.vault(vault)?.get_user_collateral_amount(user))
    }

    fn asset_price(&self, tracker: &Address, symbol: &str) -> Result<u64> {
        self.tracker(tracker)?.get_asset_price(symbol)
    }

    fn usdc_price(&self, tracker: &Address) -> Result<u64> {
        Ok(self.tracker(tracker)?.get_usdc_price())
    }

    fn mint_synth(&mut self, ledger: &Address, hub: &Address, to: &Address, amount: u64) -> Result<()> {
        self.ledger_mut(ledger)?.mint(hub, to, amount)
    }

    fn burn_synth(&mut self, ledger: &Address, hub: &Address, from: &Address, amount: u64) -> Result<()> {
        self.ledger_mut(ledger)?.burn(hub, from, amount)
    }

    fn set_collateral_amount(&mut self, vault: &Address, hub: &Address, user: &Address, amount: u64) -> Result<()> {
        self.vault_mut(vault)?.set_user_collateral_amount(hub, user, amount)
    }

    fn set_eligible_to_burn(&mut self, ledger: &Address, hub: &Address, user: &Address, amount: u64) -> Result<()> {
        self.ledger_mut(ledger)?.set_amount_eligible_to_burn(hub, user, amount)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DEPLOYMENT
// ═══════════════════════════════════════════════════════════════════════════════

/// Addresses of a canonical deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentAddresses {
    /// Administrator of every component
    pub owner: Address,
    /// Hub
    pub hub: Address,
    /// Collateral vault
    pub vault: Address,
    /// Price tracker
    pub tracker: Address,
    /// Stable collateral token
    pub usdc: Address,
    /// Oracle fee token
    pub payment_token: Address,
    /// Oracle node
    pub oracle: Address,
    /// Automation registry
    pub keepers_registry: Address,
    /// Stable-price aggregator
    pub aggregator: Address,
    /// Ledger per symbol
    pub ledgers: BTreeMap<String, Address>,
}

/// A wired hub plus everything it coordinates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    /// Mint/burn coordinator
    pub hub: ProtocolHub,
    /// Vaults, trackers, ledgers and tokens
    pub components: ComponentRegistry,
    /// Parameters the deployment was built with
    pub params: ProtocolParams,
    /// Canonical addresses
    pub addresses: DeploymentAddresses,
}

impl Deployment {
    /// Owner address
    pub fn owner(&self) -> Address {
        self.addresses.owner
    }

    /// The collateral vault
    pub fn vault(&self) -> Result<&CollateralVault> {
        self.components.vault(&self.addresses.vault)
    }

    /// The price tracker
    pub fn tracker(&self) -> Result<&PriceTracker> {
        self.components.tracker(&self.addresses.tracker)
    }

    /// Mutable price tracker
    pub fn tracker_mut(&mut self) -> Result<&mut PriceTracker> {
        self.components.tracker_mut(&self.addresses.tracker)
    }

    /// Ledger for `symbol`
    pub fn ledger(&self, symbol: &str) -> Result<&SynthSupplyLedger> {
        let address = self
            .addresses
            .ledgers
            .get(symbol)
            .ok_or_else(|| Error::NotConfigured(format!("{} synth asset", symbol)))?;
        self.components.ledger(address)
    }

    /// The stable collateral token
    pub fn usdc(&self) -> Result<&BalanceToken> {
        self.components.token(&self.addresses.usdc)
    }

    /// Credit `amount` collateral tokens to `user` and approve the vault for them
    pub fn fund_collateral(&mut self, user: &Address, amount: u64) -> Result<()> {
        let vault = self.addresses.vault;
        let usdc = self.components.token_mut(&self.addresses.usdc)?;
        usdc.mint(user, amount)?;
        let allowance = usdc.allowance(user, &vault).saturating_add(amount);
        usdc.approve(user, &vault, allowance)
    }

    /// Deposit collateral into the vault
    pub fn deposit(&mut self, user: &Address, amount: u64) -> Result<u64> {
        self.components.deposit(&self.addresses.vault, user, amount)
    }

    /// Withdraw collateral from the vault
    pub fn withdraw(&mut self, user: &Address, amount: u64) -> Result<u64> {
        self.components.withdraw(&self.addresses.vault, user, amount)
    }

    /// Mint through the hub
    pub fn mint(&mut self, symbol: &str, amount: u64, to: &Address) -> Result<()> {
        self.hub.mint_synth_asset(&mut self.components, symbol, amount, to)
    }

    /// Burn through the hub
    pub fn burn(&mut self, symbol: &str, amount: u64, from: &Address) -> Result<()> {
        self.hub.burn_synth_asset(&mut self.components, symbol, amount, from)
    }

    /// Collateral value of `user` at the current stable price
    pub fn collateral_value(&self, user: &Address) -> Result<u128> {
        self.hub.get_user_collateral_value(&self.components, user)
    }

    /// Register a new synthetic asset: deploys its ledger, wires it and lists it on the tracker
    pub fn add_synth_asset(&mut self, caller: &Address, symbol: &str, name: &str) -> Result<Address> {
        validate_non_empty(symbol, "symbol")?;
        if self.tracker()?.is_registered(symbol) || self.addresses.ledgers.contains_key(symbol) {
            return Err(Error::AlreadyRegistered(symbol.to_string()));
        }
        let owner = self.owner();
        let hub = self.addresses.hub;
        let address = Address::from_label(&format!("synthex/ledger/{}", symbol));

        let mut ledger = SynthSupplyLedger::new(address, owner, name, symbol)?
            .with_event_capacity(self.params.max_events);
        ledger.set_hub_address(&owner, hub)?;

        self.hub.set_synth_asset_address(caller, symbol, address)?;
        self.components
            .tracker_mut(&self.addresses.tracker)?
            .add_asset(caller, symbol)?;

        self.components.insert_ledger(ledger);
        self.addresses.ledgers.insert(symbol.to_string(), address);
        Ok(address)
    }

    /// Issue a price request for `symbol`
    pub fn request_price(
        &mut self,
        caller: &Address,
        symbol: &str,
        gateway: &mut dyn OracleGateway,
        now: u64,
    ) -> Result<RequestId> {
        self.tracker_mut()?.update_asset_price(caller, symbol, gateway, now)
    }

    /// Deliver the oracle's answer
    pub fn fulfill(&mut self, caller: &Address, request_id: &RequestId, result: &OracleResult) -> Result<u64> {
        self.tracker_mut()?.fulfill(caller, request_id, result)
    }

    /// Run the automated refresh if it is due
    pub fn run_upkeep(&mut self, caller: &Address, gateway: &mut dyn OracleGateway, now: u64) -> Result<Option<Vec<RequestId>>> {
        let tracker = self.tracker_mut()?;
        if !tracker.check_upkeep(now) {
            return Ok(None);
        }
        tracker.perform_upkeep(caller, gateway, now).map(Some)
    }

    /// Check the accounting invariants of every component
    pub fn verify_invariants(&self) -> bool {
        self.components.verify_invariants()
    }

    /// Combined state hash of hub and components
    pub fn state_hash(&self) -> Hash {
        let mut data = Vec::new();
        data.extend_from_slice(self.hub.state_hash().as_bytes());
        data.extend_from_slice(self.components.state_hash().as_bytes());
        Hash::sha256(&data)
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| Error::Deserialization(e.to_string()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BUILDER
// ═══════════════════════════════════════════════════════════════════════════════

/// Builder for a canonical [`Deployment`]
#[derive(Debug, Clone)]
pub struct DeploymentBuilder {
    owner: Address,
    params: ProtocolParams,
    oracle: Address,
    keepers_registry: Address,
    aggregator: Address,
    job_id: Hash,
    api_key: String,
    fee_funding: u64,
    assets: Vec<(String, String)>,
}

impl DeploymentBuilder {
    /// Start a deployment administered by `owner`
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            params: ProtocolParams::default(),
            oracle: Address::from_label("synthex/oracle"),
            keepers_registry: Address::from_label("synthex/keepers"),
            aggregator: Address::from_label("synthex/usdc-usd-feed"),
            job_id: Hash::sha256(b"synthex/price-job"),
            api_key: "synthex-api-key".into(),
            fee_funding: 0,
            assets: Vec::new(),
        }
    }

    /// Use custom protocol parameters
    pub fn params(mut self, params: ProtocolParams) -> Self {
        self.params = params;
        self
    }

    /// Oracle node allowed to fulfill
    pub fn oracle(mut self, oracle: Address) -> Self {
        self.oracle = oracle;
        self
    }

    /// Automation registry allowed to refresh prices
    pub fn keepers_registry(mut self, registry: Address) -> Self {
        self.keepers_registry = registry;
        self
    }

    /// Stable-price aggregator
    pub fn aggregator(mut self, aggregator: Address) -> Self {
        self.aggregator = aggregator;
        self
    }

    /// Oracle job id
    pub fn job_id(mut self, job_id: Hash) -> Self {
        self.job_id = job_id;
        self
    }

    /// Data-provider API key
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    /// Fee tokens credited to the tracker at deployment
    pub fn fee_funding(mut self, amount: u64) -> Self {
        self.fee_funding = amount;
        self
    }

    /// Add a synthetic asset
    pub fn asset(mut self, symbol: impl Into<String>, name: impl Into<String>) -> Self {
        self.assets.push((symbol.into(), name.into()));
        self
    }

    /// Deploy and wire every component
    pub fn build(self, now: u64) -> Result<Deployment> {
        validate_address(&self.owner, "owner")?;
        self.params.validate()?;
        let owner = self.owner;
        let max_events = self.params.max_events;

        let addresses = DeploymentAddresses {
            owner,
            hub: Address::from_label("synthex/hub"),
            vault: Address::from_label("synthex/vault"),
            tracker: Address::from_label("synthex/tracker"),
            usdc: Address::from_label("synthex/usdc"),
            payment_token: Address::from_label("synthex/link"),
            oracle: self.oracle,
            keepers_registry: self.keepers_registry,
            aggregator: self.aggregator,
            ledgers: BTreeMap::new(),
        };

        let mut components = ComponentRegistry::new();
        components.insert_token(BalanceToken::new(addresses.usdc, "USD Coin", "USDC", 6));

        let mut link = BalanceToken::new(addresses.payment_token, "ChainLink Token", "LINK", 18);
        if self.fee_funding > 0 {
            link.mint(&addresses.tracker, self.fee_funding)?;
        }
        components.insert_token(link);

        let mut vault = CollateralVault::new(addresses.vault, owner, addresses.usdc)?
            .with_event_capacity(max_events);
        vault.set_hub_address(&owner, addresses.hub)?;
        components.insert_vault(vault);

        let tracker_config = PriceTrackerConfig {
            fee: self.params.oracle_fee,
            update_interval: self.params.update_interval_secs,
            ..PriceTrackerConfig::new(
                addresses.payment_token,
                addresses.aggregator,
                addresses.oracle,
                self.job_id,
                self.api_key,
            )
        };
        let mut tracker = PriceTracker::new(addresses.tracker, owner, tracker_config, now)?
            .with_event_capacity(max_events);
        tracker.set_hub_address(&owner, addresses.hub)?;
        tracker.set_keepers_registry_address(&owner, addresses.keepers_registry)?;
        components.insert_tracker(tracker);

        let mut hub = ProtocolHub::new(addresses.hub, owner)?
            .with_collateral_ratio(self.params.collateral_ratio)?
            .with_event_capacity(max_events);
        hub.set_collateral_fund_address(&owner, addresses.vault)?;
        hub.set_price_tracker_address(&owner, addresses.tracker)?;

        let mut deployment = Deployment {
            hub,
            components,
            params: self.params,
            addresses,
        };

        for (symbol, name) in &self.assets {
            deployment.add_synth_asset(&owner, symbol, name)?;
        }

        tracing::info!(
            hub = %deployment.addresses.hub,
            assets = deployment.addresses.ledgers.len(),
            "deployment wired"
        );
        Ok(deployment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::gateway::MockOracleGateway;

    fn deploy() -> Deployment {
        DeploymentBuilder::new(Address::from_label("owner"))
            .asset("TSLA", "Synthetic Tesla")
            .asset("AAPL", "Synthetic Apple")
            .fee_funding(1_000)
            .build(0)
            .unwrap()
    }

    #[test]
    fn test_builder_wires_components() {
        let d = deploy();

        assert_eq!(d.vault().unwrap().hub(), Some(d.addresses.hub));
        assert_eq!(d.tracker().unwrap().hub(), Some(d.addresses.hub));
        assert_eq!(d.tracker().unwrap().get_asset_list().len(), 2);
        assert_eq!(d.ledger("TSLA").unwrap().hub(), Some(d.addresses.hub));
        assert_eq!(d.hub.synth_asset("AAPL"), d.addresses.ledgers.get("AAPL").copied());
        assert!(d.verify_invariants());
    }

    #[test]
    fn test_mint_through_registry() {
        let mut d = deploy();
        let owner = d.owner();
        let user = Address::from_label("user");

        d.fund_collateral(&user, 100).unwrap();
        d.deposit(&user, 100).unwrap();
        d.tracker_mut().unwrap().set_usdc_price(&owner, 1).unwrap();
        d.tracker_mut().unwrap().set_asset_price(&owner, "TSLA", 40).unwrap();

        d.mint("TSLA", 1, &user).unwrap();
        assert_eq!(d.ledger("TSLA").unwrap().balance_of(&user), 1);
        assert_eq!(d.hub.get_user_total_value_minted(&user), 40);

        d.burn("TSLA", 1, &user).unwrap();
        assert_eq!(d.ledger("TSLA").unwrap().total_supply(), 0);
        assert!(d.verify_invariants());
    }

    #[test]
    fn test_unknown_component() {
        let registry = ComponentRegistry::new();
        assert!(matches!(
            registry.collateral_amount(&Address::from_label("nowhere"), &Address::from_label("u")),
            Err(Error::UnknownComponent { kind: "vault", .. })
        ));
    }

    #[test]
    fn test_run_upkeep_when_due() {
        let mut d = deploy();
        let keeper = d.addresses.keepers_registry;
        let mut gateway = MockOracleGateway::new(1);

        assert_eq!(d.run_upkeep(&keeper, &mut gateway, 10).unwrap(), None);
        let ids = d.run_upkeep(&keeper, &mut gateway, 61).unwrap().unwrap();
        assert_eq!(ids.len(), 2);

        let oracle = d.addresses.oracle;
        d.fulfill(&oracle, &ids[0], &OracleResult::from_price(40)).unwrap();
        assert_eq!(d.tracker().unwrap().get_asset_price("TSLA").unwrap(), 40);
    }

    #[test]
    fn test_withdraw_fees() {
        let mut d = deploy();
        let owner = d.owner();
        let tracker = d.addresses.tracker;

        assert_eq!(d.components.withdraw_fees(&tracker, &owner).unwrap(), 1_000);
        assert_eq!(
            d.components.token(&d.addresses.payment_token).unwrap().balance_of(&owner),
            1_000
        );
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let mut d = deploy();
        let user = Address::from_label("user");
        d.fund_collateral(&user, 50).unwrap();
        d.deposit(&user, 50).unwrap();

        let restored = Deployment::from_bytes(&d.to_bytes().unwrap()).unwrap();
        assert_eq!(restored.state_hash(), d.state_hash());
    }
}

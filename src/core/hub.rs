//! Protocol hub.
//!
//! Coordinates every mint and burn: reads the price tracker, reads the
//! collateral vault, checks the over-collateralization requirement, commits
//! its own position bookkeeping and finally writes the per-symbol supply
//! ledger. Collateral value is always computed on demand and never cached.
//!
//! The hub reaches the other components through [`HubCollaborators`], keyed by
//! the addresses it has been wired with.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::error::{Error, Result};
use crate::protocol::events::{EventLog, ProtocolEvent};
use crate::utils::constants::DEFAULT_COLLATERAL_RATIO;
use crate::utils::crypto::{Address, Hash};
use crate::utils::math::*;
use crate::utils::validation::*;

// ═══════════════════════════════════════════════════════════════════════════════
// COLLABORATOR INTERFACE
// ═══════════════════════════════════════════════════════════════════════════════

/// Calls the hub makes into the components it coordinates
///
/// Mutating calls carry the hub's own address as caller so the target
/// component performs its usual hub-only check.
pub trait HubCollaborators {
    /// Vault position of `user`
    fn collateral_amount(&self, vault: &Address, user: &Address) -> Result<u64>;

    /// Cached price of `symbol`
    fn asset_price(&self, tracker: &Address, symbol: &str) -> Result<u64>;

    /// Cached stable collateral price
    fn usdc_price(&self, tracker: &Address) -> Result<u64>;

    /// Mint on the ledger at `ledger`
    fn mint_synth(&mut self, ledger: &Address, hub: &Address, to: &Address, amount: u64) -> Result<()>;

    /// Burn on the ledger at `ledger`
    fn burn_synth(&mut self, ledger: &Address, hub: &Address, from: &Address, amount: u64) -> Result<()>;

    /// Overwrite a vault position
    fn set_collateral_amount(&mut self, vault: &Address, hub: &Address, user: &Address, amount: u64) -> Result<()>;

    /// Overwrite a ledger eligibility
    fn set_eligible_to_burn(&mut self, ledger: &Address, hub: &Address, user: &Address, amount: u64) -> Result<()>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// USER ACCOUNT
// ═══════════════════════════════════════════════════════════════════════════════

/// Minted units of one symbol and the value they were minted at
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthPosition {
    /// Units outstanding
    pub amount: u64,
    /// Value at mint-time prices still carried by those units
    pub value_minted: u128,
}

/// Hub bookkeeping for one user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    /// Position per symbol
    pub positions: BTreeMap<String, SynthPosition>,
}

impl UserAccount {
    /// Position amount for `symbol`
    pub fn position(&self, symbol: &str) -> u64 {
        self.positions.get(symbol).map(|p| p.amount).unwrap_or(0)
    }

    /// Value still carried by the `symbol` position
    pub fn value_minted(&self, symbol: &str) -> u128 {
        self.positions.get(symbol).map(|p| p.value_minted).unwrap_or(0)
    }

    /// Sum of the minted value carried by every position
    ///
    /// Each increase is checked against this sum, so it cannot overflow.
    pub fn total_value_minted(&self) -> u128 {
        self.positions.values().fold(0u128, |acc, p| acc.saturating_add(p.value_minted))
    }

    /// Share of the `symbol` value released by burning `amount` units
    pub fn released_value(&self, symbol: &str, amount: u64) -> u128 {
        let position = self.positions.get(symbol).copied().unwrap_or_default();
        if amount >= position.amount {
            return position.value_minted;
        }
        pro_rata(position.value_minted, amount, position.amount)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROTOCOL HUB
// ═══════════════════════════════════════════════════════════════════════════════

/// Mint/burn coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolHub {
    /// Hub address
    address: Address,
    /// Administrator
    owner: Address,
    /// Collateral vault
    collateral_fund: Option<Address>,
    /// Price tracker
    price_tracker: Option<Address>,
    /// Supply ledger per symbol
    synth_assets: HashMap<String, Address>,
    /// Over-collateralization multiplier
    collateral_ratio: u64,
    /// Per-user bookkeeping
    accounts: HashMap<Address, UserAccount>,
    /// Event history
    events: EventLog,
}

impl ProtocolHub {
    /// Deploy a hub at `address`, administered by `owner`
    pub fn new(address: Address, owner: Address) -> Result<Self> {
        validate_address(&address, "hub")?;
        validate_address(&owner, "owner")?;

        Ok(Self {
            address,
            owner,
            collateral_fund: None,
            price_tracker: None,
            synth_assets: HashMap::new(),
            collateral_ratio: DEFAULT_COLLATERAL_RATIO,
            accounts: HashMap::new(),
            events: EventLog::new(),
        })
    }

    /// Use a custom over-collateralization multiplier
    pub fn with_collateral_ratio(mut self, ratio: u64) -> Result<Self> {
        validate_collateral_ratio(ratio)?;
        self.collateral_ratio = ratio;
        Ok(self)
    }

    /// Use a bounded event history of `max_events`
    pub fn with_event_capacity(mut self, max_events: usize) -> Self {
        self.events = EventLog::with_capacity(max_events);
        self
    }

    fn only_owner(&self, caller: &Address) -> Result<()> {
        require_role(caller, &[Some(self.owner)], "owner")
    }

    fn vault(&self) -> Result<Address> {
        self.collateral_fund
            .ok_or_else(|| Error::NotConfigured("collateral fund".into()))
    }

    fn tracker(&self) -> Result<Address> {
        self.price_tracker
            .ok_or_else(|| Error::NotConfigured("price tracker".into()))
    }

    fn ledger(&self, symbol: &str) -> Result<Address> {
        self.synth_assets
            .get(symbol)
            .copied()
            .ok_or_else(|| Error::NotConfigured(format!("{} synth asset", symbol)))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // MINT / BURN
    // ═══════════════════════════════════════════════════════════════════════════

    /// Mint `amount` units of `symbol` to `to` against their vault collateral
    ///
    /// Fails with [`Error::InsufficientCollateral`] when
    /// `collateral_value < amount × price × ratio + total_value_minted`.
    pub fn mint_synth_asset(
        &mut self,
        env: &mut dyn HubCollaborators,
        symbol: &str,
        amount: u64,
        to: &Address,
    ) -> Result<()> {
        validate_non_empty(symbol, "symbol")?;
        validate_non_zero(amount)?;
        validate_address(to, "to")?;
        let ledger = self.ledger(symbol)?;
        let tracker = self.tracker()?;
        let vault = self.vault()?;

        let price = env.asset_price(&tracker, symbol)?;
        if price == 0 {
            return Err(Error::PriceUnavailable(symbol.to_string()));
        }
        let usdc_price = env.usdc_price(&tracker)?;
        let collateral_value = asset_value(env.collateral_amount(&vault, to)?, usdc_price);

        let minted = self.get_user_total_value_minted(to);
        let required = checked_add_value(
            required_collateral_value(amount, price, self.collateral_ratio)?,
            minted,
            "required collateral",
        )?;
        if collateral_value < required {
            return Err(Error::InsufficientCollateral {
                required,
                available: collateral_value,
            });
        }

        let snapshot = self.accounts.get(to).cloned();
        self.apply_increase(symbol, to, amount, asset_value(amount, price))?;

        if let Err(e) = env.mint_synth(&ledger, &self.address, to, amount) {
            self.restore(to, snapshot);
            tracing::warn!(symbol, to = %to, amount, error = %e, "ledger mint failed, hub state restored");
            return Err(e);
        }

        self.record_position(symbol, to);
        tracing::info!(symbol, to = %to, amount, price, "synth asset minted");
        Ok(())
    }

    /// Burn `amount` units of `symbol` held by `from` and release their position
    ///
    /// The minted value released is the burned share of what this symbol was
    /// minted at; other symbols keep their value.
    pub fn burn_synth_asset(
        &mut self,
        env: &mut dyn HubCollaborators,
        symbol: &str,
        amount: u64,
        from: &Address,
    ) -> Result<()> {
        validate_non_empty(symbol, "symbol")?;
        validate_non_zero(amount)?;
        validate_address(from, "from")?;
        let ledger = self.ledger(symbol)?;
        let tracker = self.tracker()?;

        let price = env.asset_price(&tracker, symbol)?;

        let snapshot = self.accounts.get(from).cloned();
        let released = snapshot
            .as_ref()
            .map(|a| a.released_value(symbol, amount))
            .unwrap_or(0);
        self.apply_decrease(symbol, from, amount, released)?;

        if let Err(e) = env.burn_synth(&ledger, &self.address, from, amount) {
            self.restore(from, snapshot);
            tracing::warn!(symbol, from = %from, amount, error = %e, "ledger burn failed, hub state restored");
            return Err(e);
        }

        self.record_position(symbol, from);
        tracing::info!(symbol, from = %from, amount, price, "synth asset burned");
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // POSITION PRIMITIVES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Raise `user`'s `symbol` position by `amount` and their minted value by `value`
    pub fn increase_user_position(
        &mut self,
        caller: &Address,
        symbol: &str,
        user: &Address,
        amount: u64,
        value: u128,
    ) -> Result<()> {
        validate_non_empty(symbol, "symbol")?;
        validate_non_zero(amount)?;
        validate_address(user, "user")?;
        self.only_owner(caller)?;
        self.apply_increase(symbol, user, amount, value)?;
        self.record_position(symbol, user);
        Ok(())
    }

    /// Lower `user`'s `symbol` position by `amount` and their minted value by `value`
    pub fn decrease_user_position(
        &mut self,
        caller: &Address,
        symbol: &str,
        user: &Address,
        amount: u64,
        value: u128,
    ) -> Result<()> {
        validate_non_empty(symbol, "symbol")?;
        validate_non_zero(amount)?;
        validate_address(user, "user")?;
        self.only_owner(caller)?;
        self.apply_decrease(symbol, user, amount, value)?;
        self.record_position(symbol, user);
        Ok(())
    }

    fn apply_increase(&mut self, symbol: &str, user: &Address, amount: u64, value: u128) -> Result<()> {
        let account = self.accounts.get(user).cloned().unwrap_or_default();
        checked_add_value(account.total_value_minted(), value, "total value minted")?;
        let position = SynthPosition {
            amount: checked_add_amount(account.position(symbol), amount, "user position")?,
            value_minted: checked_add_value(account.value_minted(symbol), value, "symbol value minted")?,
        };
        self.commit(symbol, user, account, position);
        Ok(())
    }

    fn apply_decrease(&mut self, symbol: &str, user: &Address, amount: u64, value: u128) -> Result<()> {
        let account = self.accounts.get(user).cloned().unwrap_or_default();
        let available = account.position(symbol);
        if available < amount {
            return Err(Error::InsufficientPosition {
                requested: amount,
                available,
            });
        }
        let position = SynthPosition {
            amount: available - amount,
            value_minted: account.value_minted(symbol).saturating_sub(value),
        };
        self.commit(symbol, user, account, position);
        Ok(())
    }

    fn commit(&mut self, symbol: &str, user: &Address, mut account: UserAccount, position: SynthPosition) {
        account.positions.insert(symbol.to_string(), position);
        self.accounts.insert(*user, account);
    }

    fn record_position(&mut self, symbol: &str, user: &Address) {
        self.events.push(ProtocolEvent::PositionChanged {
            symbol: symbol.to_string(),
            user: *user,
            position: self.get_user_position_amount(symbol, user),
            total_value_minted: self.get_user_total_value_minted(user),
        });
    }

    fn restore(&mut self, user: &Address, snapshot: Option<UserAccount>) {
        match snapshot {
            Some(account) => {
                self.accounts.insert(*user, account);
            }
            None => {
                self.accounts.remove(user);
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // LIQUIDATION HOOKS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Overwrite `user`'s vault position through the hub-only vault setter
    pub fn rebalance_collateral(
        &mut self,
        caller: &Address,
        env: &mut dyn HubCollaborators,
        user: &Address,
        amount: u64,
    ) -> Result<()> {
        validate_address(user, "user")?;
        self.only_owner(caller)?;
        let vault = self.vault()?;

        env.set_collateral_amount(&vault, &self.address, user, amount)?;
        tracing::warn!(user = %user, amount, "collateral rebalanced");
        Ok(())
    }

    /// Overwrite `user`'s burnable amount of `symbol` through the ledger override
    pub fn override_eligible_to_burn(
        &mut self,
        caller: &Address,
        env: &mut dyn HubCollaborators,
        symbol: &str,
        user: &Address,
        amount: u64,
    ) -> Result<()> {
        validate_non_empty(symbol, "symbol")?;
        validate_address(user, "user")?;
        self.only_owner(caller)?;
        let ledger = self.ledger(symbol)?;

        env.set_eligible_to_burn(&ledger, &self.address, user, amount)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // WIRING
    // ═══════════════════════════════════════════════════════════════════════════

    fn address_updated(&mut self, slot: String, address: Address) {
        tracing::info!(slot = %slot, %address, "hub address updated");
        self.events.push(ProtocolEvent::AddressUpdated { slot, address });
    }

    /// Set the collateral vault
    pub fn set_collateral_fund_address(&mut self, caller: &Address, vault: Address) -> Result<()> {
        validate_address(&vault, "collateral fund")?;
        self.only_owner(caller)?;
        self.collateral_fund = Some(vault);
        self.address_updated("collateral_fund".into(), vault);
        Ok(())
    }

    /// Set the price tracker
    pub fn set_price_tracker_address(&mut self, caller: &Address, tracker: Address) -> Result<()> {
        validate_address(&tracker, "price tracker")?;
        self.only_owner(caller)?;
        self.price_tracker = Some(tracker);
        self.address_updated("price_tracker".into(), tracker);
        Ok(())
    }

    /// Set the supply ledger for `symbol`
    pub fn set_synth_asset_address(&mut self, caller: &Address, symbol: &str, ledger: Address) -> Result<()> {
        validate_non_empty(symbol, "symbol")?;
        validate_address(&ledger, "synth asset")?;
        self.only_owner(caller)?;
        self.synth_assets.insert(symbol.to_string(), ledger);
        self.address_updated(format!("synth:{}", symbol), ledger);
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Minted units of `symbol` held by `user`
    pub fn get_user_position_amount(&self, symbol: &str, user: &Address) -> u64 {
        self.accounts.get(user).map(|a| a.position(symbol)).unwrap_or(0)
    }

    /// Value minted by `user` at mint-time prices, net of burns
    pub fn get_user_total_value_minted(&self, user: &Address) -> u128 {
        self.accounts.get(user).map(UserAccount::total_value_minted).unwrap_or(0)
    }

    /// Vault position of `user` valued at the current stable price
    pub fn get_user_collateral_value(&self, env: &dyn HubCollaborators, user: &Address) -> Result<u128> {
        let vault = self.vault()?;
        let tracker = self.tracker()?;

        let usdc_price = env.usdc_price(&tracker)?;
        let amount = env.collateral_amount(&vault, user)?;
        Ok(asset_value(amount, usdc_price))
    }

    /// Full bookkeeping of `user`
    pub fn account(&self, user: &Address) -> Option<&UserAccount> {
        self.accounts.get(user)
    }

    /// Hub address
    pub fn address(&self) -> Address {
        self.address
    }

    /// Owner address
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Collateral vault, if set
    pub fn collateral_fund(&self) -> Option<Address> {
        self.collateral_fund
    }

    /// Price tracker, if set
    pub fn price_tracker(&self) -> Option<Address> {
        self.price_tracker
    }

    /// Ledger wired for `symbol`
    pub fn synth_asset(&self, symbol: &str) -> Option<Address> {
        self.synth_assets.get(symbol).copied()
    }

    /// Over-collateralization multiplier
    pub fn collateral_ratio(&self) -> u64 {
        self.collateral_ratio
    }

    /// Event history
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| Error::Deserialization(e.to_string()))
    }

    /// Compute state hash over all user accounts
    pub fn state_hash(&self) -> Hash {
        let mut data = Vec::new();
        data.extend_from_slice(self.address.as_bytes());
        data.extend_from_slice(&self.collateral_ratio.to_be_bytes());

        let mut users: Vec<_> = self.accounts.iter().collect();
        users.sort_by_key(|(k, _)| **k);

        for (user, account) in users {
            data.extend_from_slice(user.as_bytes());
            for (symbol, position) in &account.positions {
                data.extend_from_slice(symbol.as_bytes());
                data.extend_from_slice(&position.amount.to_be_bytes());
                data.extend_from_slice(&position.value_minted.to_be_bytes());
            }
        }

        Hash::sha256(&data)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Fixed prices and positions, with an optional failing ledger
    #[derive(Default)]
    struct StubEnv {
        collateral: HashMap<Address, u64>,
        prices: HashMap<String, u64>,
        usdc_price: u64,
        minted: Vec<(Address, u64)>,
        burned: Vec<(Address, u64)>,
        fail_ledger: bool,
        reads: RefCell<Vec<&'static str>>,
    }

    impl HubCollaborators for StubEnv {
        fn collateral_amount(&self, _vault: &Address, user: &Address) -> Result<u64> {
            self.reads.borrow_mut().push("collateral_amount");
            Ok(self.collateral.get(user).copied().unwrap_or(0))
        }

        fn asset_price(&self, _tracker: &Address, symbol: &str) -> Result<u64> {
            self.reads.borrow_mut().push("asset_price");
            self.prices
                .get(symbol)
                .copied()
                .ok_or_else(|| Error::NotRegistered(symbol.to_string()))
        }

        fn usdc_price(&self, _tracker: &Address) -> Result<u64> {
            self.reads.borrow_mut().push("usdc_price");
            Ok(self.usdc_price)
        }

        fn mint_synth(&mut self, _ledger: &Address, _hub: &Address, to: &Address, amount: u64) -> Result<()> {
            if self.fail_ledger {
                return Err(Error::External("ledger".into()));
            }
            self.minted.push((*to, amount));
            Ok(())
        }

        fn burn_synth(&mut self, _ledger: &Address, _hub: &Address, from: &Address, amount: u64) -> Result<()> {
            if self.fail_ledger {
                return Err(Error::External("ledger".into()));
            }
            self.burned.push((*from, amount));
            Ok(())
        }

        fn set_collateral_amount(&mut self, _vault: &Address, _hub: &Address, user: &Address, amount: u64) -> Result<()> {
            self.collateral.insert(*user, amount);
            Ok(())
        }

        fn set_eligible_to_burn(&mut self, _ledger: &Address, _hub: &Address, _user: &Address, _amount: u64) -> Result<()> {
            Ok(())
        }
    }

    fn setup() -> (ProtocolHub, StubEnv, Address, Address) {
        let owner = Address::from_label("owner");
        let user = Address::from_label("user");

        let mut hub = ProtocolHub::new(Address::from_label("hub"), owner).unwrap();
        hub.set_collateral_fund_address(&owner, Address::from_label("vault")).unwrap();
        hub.set_price_tracker_address(&owner, Address::from_label("tracker")).unwrap();
        hub.set_synth_asset_address(&owner, "TSLA", Address::from_label("sTSLA")).unwrap();

        let mut env = StubEnv {
            usdc_price: 1,
            ..StubEnv::default()
        };
        env.prices.insert("TSLA".into(), 40);
        env.collateral.insert(user, 100);

        (hub, env, owner, user)
    }

    #[test]
    fn test_mint_threshold() {
        let (mut hub, mut env, _, user) = setup();

        assert_eq!(hub.get_user_collateral_value(&env, &user).unwrap(), 100);

        // 10 × 40 × 2 = 800 > 100
        assert_eq!(
            hub.mint_synth_asset(&mut env, "TSLA", 10, &user),
            Err(Error::InsufficientCollateral { required: 800, available: 100 })
        );

        hub.mint_synth_asset(&mut env, "TSLA", 1, &user).unwrap();
        assert_eq!(hub.get_user_position_amount("TSLA", &user), 1);
        assert_eq!(hub.get_user_total_value_minted(&user), 40);
        assert_eq!(env.minted, vec![(user, 1)]);

        // 80 + 40 = 120 > 100
        assert_eq!(
            hub.mint_synth_asset(&mut env, "TSLA", 1, &user),
            Err(Error::InsufficientCollateral { required: 120, available: 100 })
        );
    }

    #[test]
    fn test_mint_validation() {
        let (mut hub, mut env, _, user) = setup();

        let err = hub.mint_synth_asset(&mut env, "", 100, &user).unwrap_err();
        assert_eq!(err.to_string(), "The symbol parameter cannot be empty");
        assert_eq!(hub.mint_synth_asset(&mut env, "TSLA", 0, &user), Err(Error::InvalidAmount));
        assert_eq!(
            hub.mint_synth_asset(&mut env, "TSLA", 100, &Address::ZERO),
            Err(Error::NullAddress("to"))
        );
        assert!(matches!(
            hub.mint_synth_asset(&mut env, "AAPL", 1, &user),
            Err(Error::NotConfigured(_))
        ));
        assert!(env.minted.is_empty());
    }

    #[test]
    fn test_mint_zero_price() {
        let (mut hub, mut env, _, user) = setup();
        env.prices.insert("TSLA".into(), 0);

        assert_eq!(
            hub.mint_synth_asset(&mut env, "TSLA", 1, &user),
            Err(Error::PriceUnavailable("TSLA".into()))
        );
    }

    #[test]
    fn test_mint_restores_on_ledger_failure() {
        let (mut hub, mut env, _, user) = setup();
        env.fail_ledger = true;

        assert!(hub.mint_synth_asset(&mut env, "TSLA", 1, &user).is_err());
        assert_eq!(hub.get_user_position_amount("TSLA", &user), 0);
        assert_eq!(hub.get_user_total_value_minted(&user), 0);
        assert!(hub.account(&user).is_none());
        assert!(hub.events().filter_by_type("PositionChanged").is_empty());
    }

    #[test]
    fn test_burn() {
        let (mut hub, mut env, _, user) = setup();
        hub.mint_synth_asset(&mut env, "TSLA", 1, &user).unwrap();

        assert_eq!(
            hub.burn_synth_asset(&mut env, "TSLA", 2, &user),
            Err(Error::InsufficientPosition { requested: 2, available: 1 })
        );

        // Price rose since mint: the whole position's minted value is released
        env.prices.insert("TSLA".into(), 50);
        hub.burn_synth_asset(&mut env, "TSLA", 1, &user).unwrap();
        assert_eq!(hub.get_user_position_amount("TSLA", &user), 0);
        assert_eq!(hub.get_user_total_value_minted(&user), 0);
        assert_eq!(env.burned, vec![(user, 1)]);
    }

    #[test]
    fn test_mint_reads_tracker_before_vault() {
        let (mut hub, mut env, _, user) = setup();

        hub.mint_synth_asset(&mut env, "TSLA", 1, &user).unwrap();
        assert_eq!(
            env.reads.borrow().as_slice(),
            &["asset_price", "usdc_price", "collateral_amount"]
        );
    }

    #[test]
    fn test_burn_keeps_other_symbols_value() {
        let (mut hub, mut env, owner, user) = setup();
        hub.set_synth_asset_address(&owner, "AAPL", Address::from_label("sAAPL")).unwrap();
        env.prices.insert("TSLA".into(), 10);
        env.prices.insert("AAPL".into(), 20);

        hub.mint_synth_asset(&mut env, "TSLA", 1, &user).unwrap();
        hub.mint_synth_asset(&mut env, "AAPL", 1, &user).unwrap();
        assert_eq!(hub.get_user_total_value_minted(&user), 30);

        env.prices.insert("TSLA".into(), 30);
        hub.burn_synth_asset(&mut env, "TSLA", 1, &user).unwrap();

        assert_eq!(hub.get_user_position_amount("AAPL", &user), 1);
        assert_eq!(hub.get_user_total_value_minted(&user), 20);
        assert_eq!(hub.account(&user).unwrap().value_minted("AAPL"), 20);

        // 3 × 20 × 2 + 20 still minted = 140 > 100
        assert_eq!(
            hub.mint_synth_asset(&mut env, "AAPL", 3, &user),
            Err(Error::InsufficientCollateral { required: 140, available: 100 })
        );
        // 2 × 20 × 2 + 20 = 100 <= 100
        hub.mint_synth_asset(&mut env, "AAPL", 2, &user).unwrap();
    }

    #[test]
    fn test_partial_burn_releases_pro_rata() {
        let (mut hub, mut env, _, user) = setup();
        env.collateral.insert(user, 1_000);

        hub.mint_synth_asset(&mut env, "TSLA", 3, &user).unwrap();
        assert_eq!(hub.get_user_total_value_minted(&user), 120);

        env.prices.insert("TSLA".into(), 5);
        hub.burn_synth_asset(&mut env, "TSLA", 1, &user).unwrap();
        assert_eq!(hub.get_user_total_value_minted(&user), 80);

        hub.burn_synth_asset(&mut env, "TSLA", 2, &user).unwrap();
        assert_eq!(hub.get_user_total_value_minted(&user), 0);
    }

    #[test]
    fn test_burn_restores_on_ledger_failure() {
        let (mut hub, mut env, _, user) = setup();
        hub.mint_synth_asset(&mut env, "TSLA", 1, &user).unwrap();
        let before = hub.state_hash();

        env.fail_ledger = true;
        assert!(hub.burn_synth_asset(&mut env, "TSLA", 1, &user).is_err());
        assert_eq!(hub.state_hash(), before);
        assert_eq!(hub.get_user_position_amount("TSLA", &user), 1);
    }

    #[test]
    fn test_position_primitives_owner_only() {
        let (mut hub, _, owner, user) = setup();

        let err = hub.increase_user_position(&user, "TSLA", &user, 1, 40).unwrap_err();
        assert!(err.to_string().starts_with("Only the owner can call this method"));

        hub.increase_user_position(&owner, "TSLA", &user, 3, 120).unwrap();
        hub.decrease_user_position(&owner, "TSLA", &user, 1, 40).unwrap();
        assert_eq!(hub.get_user_position_amount("TSLA", &user), 2);
        assert_eq!(hub.get_user_total_value_minted(&user), 80);
    }

    #[test]
    fn test_setters() {
        let (mut hub, _, owner, user) = setup();

        assert_eq!(
            hub.set_collateral_fund_address(&owner, Address::ZERO),
            Err(Error::NullAddress("collateral fund"))
        );
        assert_eq!(
            hub.set_synth_asset_address(&owner, "", Address::from_label("x")),
            Err(Error::EmptyString("symbol"))
        );
        assert!(hub.set_price_tracker_address(&user, Address::from_label("x")).is_err());
    }

    #[test]
    fn test_rebalance_collateral() {
        let (mut hub, mut env, owner, user) = setup();

        assert!(hub.rebalance_collateral(&user, &mut env, &user, 0).is_err());
        hub.rebalance_collateral(&owner, &mut env, &user, 500).unwrap();
        assert_eq!(hub.get_user_collateral_value(&env, &user).unwrap(), 500);
    }

    #[test]
    fn test_custom_ratio() {
        let owner = Address::from_label("owner");
        let hub = ProtocolHub::new(Address::from_label("hub"), owner)
            .unwrap()
            .with_collateral_ratio(3)
            .unwrap();
        assert_eq!(hub.collateral_ratio(), 3);
        assert!(ProtocolHub::new(Address::from_label("hub"), owner)
            .unwrap()
            .with_collateral_ratio(0)
            .is_err());
    }
}

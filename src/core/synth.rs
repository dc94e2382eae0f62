//! Synthetic supply ledger.
//!
//! One ledger per synthetic symbol. Besides a plain token balance each holder
//! has an `eligible_to_burn` amount: minting raises both, burning lowers both,
//! and the hub may override eligibility on its own. The two are deliberately
//! allowed to diverge; overrides are recorded as events.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::protocol::events::{EventLog, ProtocolEvent};
use crate::utils::crypto::{Address, Hash};
use crate::utils::math::checked_add_amount;
use crate::utils::validation::*;

/// Supply ledger for a single synthetic asset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthSupplyLedger {
    /// Ledger address
    address: Address,
    /// Administrator
    owner: Address,
    /// Hub allowed to mint, burn and override eligibility
    hub: Option<Address>,
    /// Token name
    name: String,
    /// Token symbol
    symbol: String,
    /// Total supply
    total_supply: u64,
    /// Token balances
    balances: HashMap<Address, u64>,
    /// Burnable amounts
    eligible: HashMap<Address, u64>,
    /// Event history
    events: EventLog,
}

impl SynthSupplyLedger {
    /// Deploy a ledger for `symbol`
    pub fn new(address: Address, owner: Address, name: impl Into<String>, symbol: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let symbol = symbol.into();
        validate_address(&address, "ledger")?;
        validate_address(&owner, "owner")?;
        validate_non_empty(&name, "name")?;
        validate_non_empty(&symbol, "symbol")?;

        Ok(Self {
            address,
            owner,
            hub: None,
            name,
            symbol,
            total_supply: 0,
            balances: HashMap::new(),
            eligible: HashMap::new(),
            events: EventLog::new(),
        })
    }

    /// Use a bounded event history of `max_events`
    pub fn with_event_capacity(mut self, max_events: usize) -> Self {
        self.events = EventLog::with_capacity(max_events);
        self
    }

    fn only_hub(&self, caller: &Address) -> Result<()> {
        require_role(caller, &[self.hub], "hub")
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SUPPLY OPERATIONS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Credit `amount` to `to`, raising balance and eligibility together
    pub fn mint(&mut self, caller: &Address, to: &Address, amount: u64) -> Result<()> {
        validate_address(to, "to")?;
        validate_non_zero(amount)?;
        self.only_hub(caller)?;

        let new_supply = checked_add_amount(self.total_supply, amount, "synth total supply")?;
        let new_balance = checked_add_amount(self.balance_of(to), amount, "synth balance")?;
        let eligible = self.eligible.get(to).copied().unwrap_or(0);
        let new_eligible = checked_add_amount(eligible, amount, "eligible to burn")?;

        self.total_supply = new_supply;
        self.balances.insert(*to, new_balance);
        self.eligible.insert(*to, new_eligible);

        self.events.push(ProtocolEvent::SynthMinted {
            symbol: self.symbol.clone(),
            to: *to,
            amount,
        });
        tracing::info!(symbol = %self.symbol, to = %to, amount, "synth minted");
        Ok(())
    }

    /// Destroy `amount` held by `from`, lowering balance and eligibility together
    pub fn burn(&mut self, caller: &Address, from: &Address, amount: u64) -> Result<()> {
        validate_address(from, "from")?;
        validate_non_zero(amount)?;
        self.only_hub(caller)?;

        let eligible = self.eligible.get(from).copied().unwrap_or(0);
        if eligible < amount {
            return Err(Error::InsufficientEligibleAmount {
                requested: amount,
                eligible,
            });
        }

        let balance = self.balance_of(from);
        if balance < amount {
            return Err(Error::InsufficientBalance {
                requested: amount,
                balance,
            });
        }

        self.eligible.insert(*from, eligible - amount);
        self.balances.insert(*from, balance - amount);
        self.total_supply -= amount;

        self.events.push(ProtocolEvent::SynthBurned {
            symbol: self.symbol.clone(),
            from: *from,
            amount,
        });
        tracing::info!(symbol = %self.symbol, from = %from, amount, "synth burned");
        Ok(())
    }

    /// Overwrite `user`'s eligibility without touching the balance
    pub fn set_amount_eligible_to_burn(&mut self, caller: &Address, user: &Address, amount: u64) -> Result<()> {
        validate_address(user, "user")?;
        self.only_hub(caller)?;

        let previous = self.eligible.insert(*user, amount).unwrap_or(0);
        let balance = self.balance_of(user);

        self.events.push(ProtocolEvent::EligibilityOverridden {
            symbol: self.symbol.clone(),
            user: *user,
            previous,
            new_amount: amount,
            balance,
        });
        if amount != balance {
            tracing::warn!(symbol = %self.symbol, user = %user, eligible = amount, balance, "eligibility diverges from balance");
        }
        Ok(())
    }

    /// Move balance between holders; eligibility stays with the minter
    pub fn transfer(&mut self, from: &Address, to: &Address, amount: u64) -> Result<()> {
        validate_address(to, "to")?;
        validate_non_zero(amount)?;

        let from_balance = self.balance_of(from);
        if from_balance < amount {
            return Err(Error::InsufficientBalance {
                requested: amount,
                balance: from_balance,
            });
        }
        if from == to {
            return Ok(());
        }

        let new_to_balance = checked_add_amount(self.balance_of(to), amount, "synth balance")?;
        self.balances.insert(*from, from_balance - amount);
        self.balances.insert(*to, new_to_balance);
        Ok(())
    }

    /// Set the hub address
    pub fn set_hub_address(&mut self, caller: &Address, hub: Address) -> Result<()> {
        validate_address(&hub, "hub")?;
        require_role(caller, &[Some(self.owner)], "owner")?;

        self.hub = Some(hub);
        self.events.push(ProtocolEvent::AddressUpdated {
            slot: "hub".into(),
            address: hub,
        });
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Burnable amount of `user`
    pub fn get_amount_eligible_to_burn(&self, user: &Address) -> Result<u64> {
        validate_address(user, "user")?;
        Ok(self.eligible.get(user).copied().unwrap_or(0))
    }

    /// Token balance of `holder`
    pub fn balance_of(&self, holder: &Address) -> u64 {
        self.balances.get(holder).copied().unwrap_or(0)
    }

    /// Total supply
    pub fn total_supply(&self) -> u64 {
        self.total_supply
    }

    /// Ledger address
    pub fn address(&self) -> Address {
        self.address
    }

    /// Hub address, if set
    pub fn hub(&self) -> Option<Address> {
        self.hub
    }

    /// Token name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Token symbol
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Event history
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Verify supply invariant (total_supply == sum of all balances)
    pub fn verify_supply_invariant(&self) -> bool {
        let sum: u128 = self.balances.values().map(|b| *b as u128).sum();
        sum == self.total_supply as u128
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| Error::Deserialization(e.to_string()))
    }

    /// Compute state hash
    pub fn state_hash(&self) -> Hash {
        let mut data = Vec::new();
        data.extend_from_slice(self.symbol.as_bytes());
        data.extend_from_slice(&self.total_supply.to_be_bytes());

        let mut holders: Vec<_> = self.balances.keys().chain(self.eligible.keys()).copied().collect();
        holders.sort();
        holders.dedup();

        for holder in holders {
            data.extend_from_slice(holder.as_bytes());
            data.extend_from_slice(&self.balance_of(&holder).to_be_bytes());
            data.extend_from_slice(&self.eligible.get(&holder).copied().unwrap_or(0).to_be_bytes());
        }

        Hash::sha256(&data)
    }
}

//! Collateral vault.
//!
//! Custodies the stable collateral token and keeps the per-depositor ledger:
//! - Deposits pulled in through the token allowance
//! - Withdrawals bounded by the caller's position
//! - Hub-only position overwrite (liquidation/rebalancing hook)
//! - Funder set tracking every depositor with a positive position

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::token::TokenLedger;
use crate::error::{Error, Result};
use crate::protocol::events::{EventLog, ProtocolEvent};
use crate::utils::crypto::{Address, Hash};
use crate::utils::math::checked_add_amount;
use crate::utils::validation::*;

// ═══════════════════════════════════════════════════════════════════════════════
// COLLATERAL VAULT
// ═══════════════════════════════════════════════════════════════════════════════

/// Pooled custody of the stable collateral token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollateralVault {
    /// Vault address (holder of the pooled tokens)
    address: Address,
    /// Administrator
    owner: Address,
    /// Hub allowed to overwrite positions
    hub: Option<Address>,
    /// Collateral token
    collateral_token: Address,
    /// Positions by depositor (zeroed, never removed)
    positions: HashMap<Address, u64>,
    /// Depositors with a positive position, in first-deposit order
    funders: Vec<Address>,
    /// Accounting total of all positions
    total_collateral: u64,
    /// Event history
    events: EventLog,
}

impl CollateralVault {
    /// Deploy a vault at `address` custodying `collateral_token`
    pub fn new(address: Address, owner: Address, collateral_token: Address) -> Result<Self> {
        validate_address(&address, "vault")?;
        validate_address(&owner, "owner")?;
        validate_address(&collateral_token, "collateral token")?;

        Ok(Self {
            address,
            owner,
            hub: None,
            collateral_token,
            positions: HashMap::new(),
            funders: Vec::new(),
            total_collateral: 0,
            events: EventLog::new(),
        })
    }

    /// Use a bounded event history of `max_events`
    pub fn with_event_capacity(mut self, max_events: usize) -> Self {
        self.events = EventLog::with_capacity(max_events);
        self
    }

    fn ensure_token(&self, token: &dyn TokenLedger) -> Result<()> {
        if token.address() != self.collateral_token {
            return Err(Error::UnknownComponent {
                kind: "collateral token",
                address: token.address().to_hex(),
            });
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // DEPOSITS / WITHDRAWALS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Pull `amount` from `caller` into the pool and credit their position
    pub fn deposit(&mut self, caller: &Address, amount: u64, token: &mut dyn TokenLedger) -> Result<u64> {
        validate_non_zero(amount)?;
        self.ensure_token(token)?;

        let previous = self.get_user_collateral_amount(caller);
        let new_position = checked_add_amount(previous, amount, "collateral position")?;
        let new_total = checked_add_amount(self.total_collateral, amount, "total collateral")?;

        token.transfer_from(&self.address, caller, &self.address, amount)?;

        self.positions.insert(*caller, new_position);
        self.total_collateral = new_total;
        if previous == 0 {
            self.funders.push(*caller);
        }

        self.events.push(ProtocolEvent::CollateralDeposited {
            depositor: *caller,
            amount,
            new_position,
        });
        tracing::info!(depositor = %caller, amount, new_position, "collateral deposited");
        Ok(new_position)
    }

    /// Debit `amount` from `caller`'s position and return the tokens
    ///
    /// The debit is rolled back if the token transfer fails.
    pub fn withdraw(&mut self, caller: &Address, amount: u64, token: &mut dyn TokenLedger) -> Result<u64> {
        validate_non_zero(amount)?;
        self.ensure_token(token)?;

        let previous = self.get_user_collateral_amount(caller);
        if previous == 0 {
            return Err(Error::NoPosition);
        }
        if amount > previous {
            return Err(Error::InsufficientPosition {
                requested: amount,
                available: previous,
            });
        }

        let new_position = previous - amount;
        self.apply_position(caller, previous, new_position);

        if let Err(e) = token.transfer(&self.address, caller, amount) {
            self.apply_position(caller, new_position, previous);
            tracing::warn!(depositor = %caller, amount, error = %e, "withdrawal transfer failed, rolled back");
            return Err(e);
        }

        self.events.push(ProtocolEvent::CollateralWithdrawn {
            depositor: *caller,
            amount,
            new_position,
        });
        tracing::info!(depositor = %caller, amount, new_position, "collateral withdrawn");
        Ok(new_position)
    }

    /// Overwrite `user`'s position; hub only
    pub fn set_user_collateral_amount(&mut self, caller: &Address, user: &Address, amount: u64) -> Result<()> {
        validate_address(user, "user")?;
        require_role(caller, &[self.hub], "hub")?;

        let previous = self.get_user_collateral_amount(user);
        checked_add_amount(self.total_collateral - previous, amount, "total collateral")?;
        self.apply_position(user, previous, amount);

        self.events.push(ProtocolEvent::CollateralOverwritten {
            user: *user,
            previous,
            new_position: amount,
        });
        tracing::warn!(user = %user, previous, new_position = amount, "collateral position overwritten");
        Ok(())
    }

    /// Move `user` from `previous` to `next`, keeping total and funder set consistent
    fn apply_position(&mut self, user: &Address, previous: u64, next: u64) {
        // Callers check that the new total fits
        self.total_collateral = self.total_collateral - previous + next;

        if previous == 0 && next == 0 && !self.positions.contains_key(user) {
            return;
        }
        self.positions.insert(*user, next);

        if previous == 0 && next > 0 {
            self.funders.push(*user);
        } else if previous > 0 && next == 0 {
            self.funders.retain(|f| f != user);
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // WIRING
    // ═══════════════════════════════════════════════════════════════════════════

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

    /// Set the collateral token address
    pub fn set_usdc_address(&mut self, caller: &Address, token: Address) -> Result<()> {
        validate_address(&token, "usdc")?;
        require_role(caller, &[Some(self.owner)], "owner")?;

        if self.total_collateral > 0 {
            tracing::warn!(total = self.total_collateral, "collateral token changed while funds are pooled");
        }
        self.collateral_token = token;
        self.events.push(ProtocolEvent::AddressUpdated {
            slot: "usdc".into(),
            address: token,
        });
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Vault address
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

    /// Collateral token address
    pub fn collateral_token(&self) -> Address {
        self.collateral_token
    }

    /// Position of `user` (0 if absent)
    pub fn get_user_collateral_amount(&self, user: &Address) -> u64 {
        self.positions.get(user).copied().unwrap_or(0)
    }

    /// Depositors with a positive position
    pub fn get_funders(&self) -> &[Address] {
        &self.funders
    }

    /// Accounting total of all positions
    pub fn total_collateral(&self) -> u64 {
        self.total_collateral
    }

    /// Event history
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Verify the accounting invariants
    ///
    /// - total equals the sum of all positions
    /// - the funder set is exactly the set of positive positions, without duplicates
    pub fn verify_invariant(&self) -> bool {
        let sum: u128 = self.positions.values().map(|p| *p as u128).sum();
        if sum != self.total_collateral as u128 {
            return false;
        }

        let positive = self.positions.values().filter(|p| **p > 0).count();
        if positive != self.funders.len() {
            return false;
        }

        let mut seen = std::collections::HashSet::new();
        self.funders
            .iter()
            .all(|f| seen.insert(*f) && self.get_user_collateral_amount(f) > 0)
    }

    /// Whether the vault's token balance covers its accounting total
    pub fn is_backed_by(&self, token: &dyn TokenLedger) -> bool {
        token.address() == self.collateral_token
            && token.balance_of(&self.address) >= self.total_collateral
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

    /// Compute state hash
    pub fn state_hash(&self) -> Hash {
        let mut data = Vec::new();
        data.extend_from_slice(self.address.as_bytes());
        data.extend_from_slice(&self.total_collateral.to_be_bytes());

        let mut sorted: Vec<_> = self.positions.iter().collect();
        sorted.sort_by_key(|(k, _)| **k);

        for (user, amount) in sorted {
            data.extend_from_slice(user.as_bytes());
            data.extend_from_slice(&amount.to_be_bytes());
        }

        Hash::sha256(&data)
    }
}

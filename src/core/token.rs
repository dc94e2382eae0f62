//! Balance-token collaborator.
//!
//! The collateral token (a stablecoin) and the oracle payment token are
//! external ledgers with standard balance/allowance semantics. The protocol
//! talks to them through [`TokenLedger`]; [`BalanceToken`] is the in-memory
//! implementation used by deployments, the CLI demo and tests.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::utils::crypto::{Address, Hash};
use crate::utils::math::checked_add_amount;
use crate::utils::validation::{validate_address, validate_non_zero};

// ═══════════════════════════════════════════════════════════════════════════════
// TOKEN LEDGER INTERFACE
// ═══════════════════════════════════════════════════════════════════════════════

/// Standard fungible-token operations the protocol relies on
pub trait TokenLedger {
    /// Token address
    fn address(&self) -> Address;

    /// Balance of `owner`
    fn balance_of(&self, owner: &Address) -> u64;

    /// Remaining amount `spender` may move on behalf of `owner`
    fn allowance(&self, owner: &Address, spender: &Address) -> u64;

    /// Set the allowance of `spender` over `owner`'s balance
    fn approve(&mut self, owner: &Address, spender: &Address, amount: u64) -> Result<()>;

    /// Move `amount` from `from` to `to`
    fn transfer(&mut self, from: &Address, to: &Address, amount: u64) -> Result<()>;

    /// Move `amount` from `from` to `to`, spending `spender`'s allowance
    fn transfer_from(
        &mut self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: u64,
    ) -> Result<()>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// IN-MEMORY TOKEN
// ═══════════════════════════════════════════════════════════════════════════════

/// In-memory fungible token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceToken {
    /// Token address
    address: Address,
    /// Token name
    pub name: String,
    /// Token symbol
    pub symbol: String,
    /// Decimal places
    pub decimals: u8,
    /// Total supply
    total_supply: u64,
    /// Balances by holder
    balances: HashMap<Address, u64>,
    /// Allowances by (owner, spender)
    allowances: HashMap<(Address, Address), u64>,
}

impl BalanceToken {
    /// Create an empty token
    pub fn new(address: Address, name: impl Into<String>, symbol: impl Into<String>, decimals: u8) -> Self {
        Self {
            address,
            name: name.into(),
            symbol: symbol.into(),
            decimals,
            total_supply: 0,
            balances: HashMap::new(),
            allowances: HashMap::new(),
        }
    }

    /// Create a token with `initial_supply` credited to `holder`
    pub fn with_supply(
        address: Address,
        name: impl Into<String>,
        symbol: impl Into<String>,
        decimals: u8,
        holder: Address,
        initial_supply: u64,
    ) -> Self {
        let mut token = Self::new(address, name, symbol, decimals);
        if initial_supply > 0 {
            token.balances.insert(holder, initial_supply);
            token.total_supply = initial_supply;
        }
        token
    }

    /// Credit new units to `to` (test and deployment funding)
    pub fn mint(&mut self, to: &Address, amount: u64) -> Result<()> {
        validate_address(to, "recipient")?;
        validate_non_zero(amount)?;

        let new_supply = checked_add_amount(self.total_supply, amount, "token total supply")?;
        let new_balance = checked_add_amount(self.balance_of(to), amount, "token balance")?;

        self.total_supply = new_supply;
        self.balances.insert(*to, new_balance);
        Ok(())
    }

    /// Get total supply
    pub fn total_supply(&self) -> u64 {
        self.total_supply
    }

    /// Verify supply invariant (total_supply == sum of all balances)
    pub fn verify_supply_invariant(&self) -> bool {
        let sum: u128 = self.balances.values().map(|b| *b as u128).sum();
        sum == self.total_supply as u128
    }

    /// Compute state hash
    pub fn state_hash(&self) -> Hash {
        let mut data = Vec::new();
        data.extend_from_slice(self.address.as_bytes());
        data.extend_from_slice(&self.total_supply.to_be_bytes());

        let mut sorted: Vec<_> = self.balances.iter().collect();
        sorted.sort_by_key(|(k, _)| **k);

        for (holder, balance) in sorted {
            data.extend_from_slice(holder.as_bytes());
            data.extend_from_slice(&balance.to_be_bytes());
        }

        Hash::sha256(&data)
    }

    fn move_balance(&mut self, from: &Address, to: &Address, amount: u64) -> Result<()> {
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

        let new_to_balance = checked_add_amount(self.balance_of(to), amount, "transfer balance")?;

        let new_from_balance = from_balance - amount;
        if new_from_balance == 0 {
            self.balances.remove(from);
        } else {
            self.balances.insert(*from, new_from_balance);
        }
        self.balances.insert(*to, new_to_balance);

        Ok(())
    }
}

impl TokenLedger for BalanceToken {
    fn address(&self) -> Address {
        self.address
    }

    fn balance_of(&self, owner: &Address) -> u64 {
        self.balances.get(owner).copied().unwrap_or(0)
    }

    fn allowance(&self, owner: &Address, spender: &Address) -> u64 {
        self.allowances.get(&(*owner, *spender)).copied().unwrap_or(0)
    }

    fn approve(&mut self, owner: &Address, spender: &Address, amount: u64) -> Result<()> {
        validate_address(spender, "spender")?;
        self.allowances.insert((*owner, *spender), amount);
        Ok(())
    }

    fn transfer(&mut self, from: &Address, to: &Address, amount: u64) -> Result<()> {
        validate_address(to, "recipient")?;
        self.move_balance(from, to, amount)
    }

    fn transfer_from(
        &mut self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: u64,
    ) -> Result<()> {
        validate_address(to, "recipient")?;

        let allowance = self.allowance(from, spender);
        if allowance < amount {
            return Err(Error::InsufficientAllowance {
                requested: amount,
                allowance,
            });
        }

        self.move_balance(from, to, amount)?;
        self.allowances.insert((*from, *spender), allowance - amount);
        Ok(())
    }
}

//! Input validation utilities for the synthex protocol.
//!
//! Every mutating operation runs these checks before touching state, in the
//! order validation → authorization → state preconditions.

use crate::error::{Error, Result};
use crate::utils::constants::MAX_COLLATERAL_RATIO;
use crate::utils::crypto::Address;

// ═══════════════════════════════════════════════════════════════════════════════
// PARAMETER VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Validate that an amount is non-zero
pub fn validate_non_zero(amount: u64) -> Result<()> {
    if amount == 0 {
        return Err(Error::InvalidAmount);
    }
    Ok(())
}

/// Validate that a string parameter is not empty
pub fn validate_non_empty(value: &str, name: &'static str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::EmptyString(name));
    }
    Ok(())
}

/// Validate that an address is not the null address
pub fn validate_address(address: &Address, name: &'static str) -> Result<()> {
    if address.is_zero() {
        return Err(Error::NullAddress(name));
    }
    Ok(())
}

/// Validate a collateralization ratio multiplier
pub fn validate_collateral_ratio(ratio: u64) -> Result<()> {
    if ratio == 0 || ratio > MAX_COLLATERAL_RATIO {
        return Err(Error::InvalidParameter {
            name: "collateral_ratio".into(),
            reason: format!("ratio {} outside [1, {}]", ratio, MAX_COLLATERAL_RATIO),
        });
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// ROLE CHECKS
// ═══════════════════════════════════════════════════════════════════════════════

/// Require `caller` to be one of `allowed`; unset roles never match
pub fn require_role(caller: &Address, allowed: &[Option<Address>], role: &'static str) -> Result<()> {
    let permitted = allowed
        .iter()
        .flatten()
        .any(|a| !a.is_zero() && a == caller);

    if !permitted {
        return Err(Error::Unauthorized {
            role,
            caller: caller.to_hex(),
        });
    }
    Ok(())
}

//! Value arithmetic with overflow protection.
//!
//! Amounts and prices are `u64`; values (amount × price, optionally × ratio)
//! are computed in `u128` with checked operations.

use crate::error::{Error, Result};

/// Value of `amount` units at `price`
pub fn asset_value(amount: u64, price: u64) -> u128 {
    // u64 × u64 always fits in u128
    amount as u128 * price as u128
}

/// Collateral value required to mint `amount` units at `price` with `ratio`
pub fn required_collateral_value(amount: u64, price: u64, ratio: u64) -> Result<u128> {
    asset_value(amount, price)
        .checked_mul(ratio as u128)
        .ok_or_else(|| Error::Overflow {
            operation: "required collateral value".into(),
        })
}

/// Checked u128 addition with a named operation for the error
pub fn checked_add_value(a: u128, b: u128, operation: &str) -> Result<u128> {
    a.checked_add(b).ok_or_else(|| Error::Overflow {
        operation: operation.into(),
    })
}

/// Checked u64 addition with a named operation for the error
pub fn checked_add_amount(a: u64, b: u64, operation: &str) -> Result<u64> {
    a.checked_add(b).ok_or_else(|| Error::Overflow {
        operation: operation.into(),
    })
}

/// `value × part / whole` without overflowing, rounded down; `part` must not exceed `whole`
pub fn pro_rata(value: u128, part: u64, whole: u64) -> u128 {
    if whole == 0 {
        return 0;
    }
    let (part, whole) = (part as u128, whole as u128);
    // remainder < whole <= u64::MAX, so remainder × part fits in u128
    value / whole * part + value % whole * part / whole
}

//! Error types for the synthex protocol.
//!
//! Every failure aborts the whole operation and surfaces as a distinct,
//! named reason. Errors fall into five categories (see [`ErrorCategory`]):
//! validation problems the caller can correct, authorization failures,
//! state preconditions that require the caller to resynchronize, arithmetic
//! overflow, and failures reported by external collaborators.

use thiserror::Error;

/// Result type alias for synthex operations
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed input, checked before anything else
    Validation,
    /// Caller does not hold the required role
    Authorization,
    /// Precondition on current state not met
    State,
    /// Checked arithmetic failed
    Arithmetic,
    /// External feed, oracle network or token collaborator failed
    Integration,
}

/// Main error type for the synthex protocol
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // ═══════════════════════════════════════════════════════════════════
    // Validation Errors
    // ═══════════════════════════════════════════════════════════════════

    /// A string parameter was empty
    #[error("The {0} parameter cannot be empty")]
    EmptyString(&'static str),

    /// Amount must be strictly positive
    #[error("Amount should be greater than zero")]
    InvalidAmount,

    /// The null address was supplied
    #[error("The {0} address cannot be null")]
    NullAddress(&'static str),

    /// Configuration value rejected
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name
        name: String,
        /// Reason for invalidity
        reason: String,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Authorization Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Caller does not hold the role required by the operation
    #[error("Only the {role} can call this method (caller {caller})")]
    Unauthorized {
        /// Role(s) allowed to call
        role: &'static str,
        /// Hex address of the rejected caller
        caller: String,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Price Tracker Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Symbol already in the supported asset list
    #[error("Asset {0} is already registered")]
    AlreadyRegistered(String),

    /// Symbol not in the supported asset list
    #[error("Asset {0} is not registered")]
    NotRegistered(String),

    /// Tracker already paused
    #[error("Price tracker is already paused")]
    AlreadyPaused,

    /// Tracker not paused
    #[error("Price tracker is not paused")]
    NotPaused,

    /// Operation rejected because the tracker is paused
    #[error("Price tracker is paused")]
    Paused,

    /// Fulfillment for a request id that is unknown or already consumed
    #[error("Unknown or already fulfilled oracle request {0}")]
    UnknownRequest(String),

    /// Upkeep attempted before the update interval elapsed
    #[error("Upkeep not needed: {elapsed}s elapsed, interval {interval}s")]
    UpkeepNotNeeded {
        /// Seconds since the last upkeep
        elapsed: u64,
        /// Configured interval in seconds
        interval: u64,
    },

    /// Price could not be represented or was negative
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    /// Registered asset has no price yet
    #[error("No price available for {0}")]
    PriceUnavailable(String),

    // ═══════════════════════════════════════════════════════════════════
    // Collateral / Supply Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Collateral value does not cover the requirement
    #[error("Insufficient collateral: required {required}, available {available}")]
    InsufficientCollateral {
        /// Required collateral value
        required: u128,
        /// Available collateral value
        available: u128,
    },

    /// Burn exceeds the holder's eligible-to-burn amount
    #[error("Insufficient eligible amount: requested {requested}, eligible {eligible}")]
    InsufficientEligibleAmount {
        /// Requested burn amount
        requested: u64,
        /// Amount eligible to burn
        eligible: u64,
    },

    /// Burn or transfer exceeds the token balance
    #[error("Insufficient balance: requested {requested}, balance {balance}")]
    InsufficientBalance {
        /// Requested amount
        requested: u64,
        /// Current balance
        balance: u64,
    },

    /// Transfer exceeds the approved allowance
    #[error("Insufficient allowance: requested {requested}, allowance {allowance}")]
    InsufficientAllowance {
        /// Requested amount
        requested: u64,
        /// Current allowance
        allowance: u64,
    },

    /// Caller has no collateral recorded
    #[error("The user has not deposited any collateral")]
    NoPosition,

    /// Amount exceeds the caller's position
    #[error("Insufficient position: requested {requested}, available {available}")]
    InsufficientPosition {
        /// Requested amount
        requested: u64,
        /// Available position
        available: u64,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Wiring Errors
    // ═══════════════════════════════════════════════════════════════════

    /// A collaborator address has not been set
    #[error("{0} address is not configured")]
    NotConfigured(String),

    /// No component is deployed at the given address
    #[error("No {kind} deployed at {address}")]
    UnknownComponent {
        /// Component kind
        kind: &'static str,
        /// Hex address
        address: String,
    },

    /// External collaborator failure (feed, oracle network)
    #[error("External call failed: {0}")]
    External(String),

    // ═══════════════════════════════════════════════════════════════════
    // Arithmetic / Serialization Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Overflow in calculation
    #[error("Arithmetic overflow in {operation}")]
    Overflow {
        /// Operation that overflowed
        operation: String,
    },

    /// Serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization failed
    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl Error {
    /// Category of this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::EmptyString(_)
            | Error::InvalidAmount
            | Error::NullAddress(_)
            | Error::InvalidParameter { .. } => ErrorCategory::Validation,

            Error::Unauthorized { .. } => ErrorCategory::Authorization,

            Error::Overflow { .. } => ErrorCategory::Arithmetic,

            Error::External(_) | Error::Serialization(_) | Error::Deserialization(_) => {
                ErrorCategory::Integration
            }

            _ => ErrorCategory::State,
        }
    }

    /// Returns true if the caller may retry after resynchronizing its view of state
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::UpkeepNotNeeded { .. }
                | Error::Paused
                | Error::PriceUnavailable(_)
                | Error::InsufficientCollateral { .. }
                | Error::InsufficientAllowance { .. }
                | Error::External(_)
        )
    }

    /// Returns the error code for external systems
    pub fn code(&self) -> u32 {
        match self {
            // Validation errors: 1xxx
            Error::EmptyString(_) => 1001,
            Error::InvalidAmount => 1002,
            Error::NullAddress(_) => 1003,
            Error::InvalidParameter { .. } => 1004,

            // Authorization errors: 2xxx
            Error::Unauthorized { .. } => 2001,

            // Price tracker errors: 3xxx
            Error::AlreadyRegistered(_) => 3001,
            Error::NotRegistered(_) => 3002,
            Error::AlreadyPaused => 3003,
            Error::NotPaused => 3004,
            Error::Paused => 3005,
            Error::UnknownRequest(_) => 3006,
            Error::UpkeepNotNeeded { .. } => 3007,
            Error::InvalidPrice(_) => 3008,
            Error::PriceUnavailable(_) => 3009,

            // Collateral / supply errors: 4xxx
            Error::InsufficientCollateral { .. } => 4001,
            Error::InsufficientEligibleAmount { .. } => 4002,
            Error::InsufficientBalance { .. } => 4003,
            Error::InsufficientAllowance { .. } => 4004,
            Error::NoPosition => 4005,
            Error::InsufficientPosition { .. } => 4006,

            // Wiring errors: 5xxx
            Error::NotConfigured(_) => 5001,
            Error::UnknownComponent { .. } => 5002,
            Error::External(_) => 5003,

            // Arithmetic / serialization errors: 9xxx
            Error::Overflow { .. } => 9001,
            Error::Serialization(_) => 9002,
            Error::Deserialization(_) => 9003,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_unique() {
        let codes = vec![
            Error::EmptyString("symbol").code(),
            Error::InvalidAmount.code(),
            Error::NullAddress("hub").code(),
            Error::Unauthorized { role: "owner", caller: String::new() }.code(),
            Error::AlreadyRegistered("TSLA".into()).code(),
            Error::NotRegistered("TSLA".into()).code(),
            Error::AlreadyPaused.code(),
            Error::NotPaused.code(),
            Error::Paused.code(),
            Error::UnknownRequest(String::new()).code(),
            Error::InsufficientCollateral { required: 0, available: 0 }.code(),
            Error::InsufficientEligibleAmount { requested: 0, eligible: 0 }.code(),
            Error::NoPosition.code(),
            Error::InsufficientPosition { requested: 0, available: 0 }.code(),
            Error::Overflow { operation: String::new() }.code(),
        ];

        let mut unique_codes = codes.clone();
        unique_codes.sort();
        unique_codes.dedup();

        assert_eq!(codes.len(), unique_codes.len(), "Error codes must be unique");
    }

    #[test]
    fn test_error_display() {
        let err = Error::InsufficientCollateral {
            required: 800,
            available: 100,
        };
        assert!(err.to_string().contains("800"));
        assert!(err.to_string().contains("100"));
        assert_eq!(
            Error::EmptyString("symbol").to_string(),
            "The symbol parameter cannot be empty"
        );
    }

    #[test]
    fn test_categories() {
        assert_eq!(Error::InvalidAmount.category(), ErrorCategory::Validation);
        assert_eq!(Error::NullAddress("to").category(), ErrorCategory::Validation);
        assert_eq!(
            Error::Unauthorized { role: "hub", caller: String::new() }.category(),
            ErrorCategory::Authorization
        );
        assert_eq!(Error::AlreadyPaused.category(), ErrorCategory::State);
        assert_eq!(Error::NoPosition.category(), ErrorCategory::State);
        assert_eq!(
            Error::Overflow { operation: "mint".into() }.category(),
            ErrorCategory::Arithmetic
        );
        assert_eq!(Error::External("feed".into()).category(), ErrorCategory::Integration);
    }

    #[test]
    fn test_is_retryable() {
        assert!(Error::Paused.is_retryable());
        assert!(!Error::Unauthorized { role: "owner", caller: String::new() }.is_retryable());
        assert!(!Error::InvalidAmount.is_retryable());
    }
}

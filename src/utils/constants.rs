//! Protocol constants and magic numbers.
//!
//! All protocol-wide constants are defined here for easy auditing and modification.

// ═══════════════════════════════════════════════════════════════════════════════
// COLLATERALIZATION CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Default collateralization ratio multiplier (2x over-collateralization)
pub const DEFAULT_COLLATERAL_RATIO: u64 = 2;

/// Largest ratio accepted by parameter validation
pub const MAX_COLLATERAL_RATIO: u64 = 100;

// ═══════════════════════════════════════════════════════════════════════════════
// ORACLE CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Default interval between automated price refreshes (seconds)
pub const DEFAULT_UPDATE_INTERVAL_SECS: u64 = 60;

/// Default payment-token fee attached to each oracle request (0.1 token, 18 decimals)
pub const DEFAULT_ORACLE_FEE: u64 = 100_000_000_000_000_000;

/// Width of an oracle fulfillment payload in bytes
pub const ORACLE_RESULT_LENGTH: usize = 32;

/// Width of an oracle job identifier in bytes
pub const JOB_ID_LENGTH: usize = 32;

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT HISTORY
// ═══════════════════════════════════════════════════════════════════════════════

/// Maximum events retained per component
pub const DEFAULT_MAX_EVENTS: usize = 1000;

// ═══════════════════════════════════════════════════════════════════════════════
// IDENTITY CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Length of an account address in bytes
pub const ADDRESS_LENGTH: usize = 20;

/// Length of a hash in bytes (SHA256)
pub const HASH_LENGTH: usize = 32;

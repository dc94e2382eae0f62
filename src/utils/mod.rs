//! Utility modules for the synthex protocol.
//!
//! This module contains shared utilities used across the protocol:
//! - Hashing and addresses
//! - Checked value arithmetic
//! - Validation and role checks
//! - The pause circuit breaker
//! - Constants

pub mod circuit_breaker;
pub mod constants;
pub mod crypto;
pub mod math;
pub mod validation;

pub use circuit_breaker::*;
pub use constants::*;
pub use crypto::*;
pub use math::*;
pub use validation::*;

//! Core modules for the synthex protocol.
//!
//! This module contains the accounting components:
//! - Protocol parameters
//! - Collateral vault
//! - Per-symbol synthetic supply ledgers
//! - The mint/burn hub
//! - The fungible-token collaborator interface

pub mod config;
pub mod hub;
pub mod synth;
pub mod token;
pub mod vault;

pub use config::*;
pub use hub::*;
pub use synth::*;
pub use token::*;
pub use vault::*;

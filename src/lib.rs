//! # synthex
//!
//! Synthetic-asset issuance core. Users deposit a stablecoin as collateral
//! and mint synthetic tokens that track off-chain asset prices, subject to an
//! over-collateralization ratio.
//!
//! ## Architecture
//!
//! - **Core**: collateral vault, per-symbol supply ledgers and the hub that
//!   enforces the collateral rule on mint and burn
//! - **Oracle**: price tracker with asynchronous oracle requests, the
//!   synchronous stable-price feed and the optional upkeep poller
//! - **Protocol**: wired deployments and the event types every component emits
//! - **CLI**: configuration, snapshots and output for the operator binary
//!
//! ## Example
//!
//! ```rust,ignore
//! use synthex::prelude::*;
//!
//! let mut deployment = DeploymentBuilder::new(owner).asset("TSLA", "Synthetic Tesla").build(now)?;
//! deployment.fund_collateral(&alice, 100)?;
//! deployment.deposit(&alice, 100)?;
//! deployment.tracker_mut()?.set_asset_price(&owner, "TSLA", 40)?;
//! deployment.mint("TSLA", 1, &alice)?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    trivial_casts,
    unused_lifetimes,
    unused_qualifications
)]

pub mod cli;
pub mod core;
pub mod error;
pub mod oracle;
pub mod protocol;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::{
        config::ProtocolParams,
        hub::{HubCollaborators, ProtocolHub, UserAccount},
        synth::SynthSupplyLedger,
        token::{BalanceToken, TokenLedger},
        vault::CollateralVault,
    };
    pub use crate::error::{Error, Result};
    pub use crate::oracle::{
        gateway::{MockOracleGateway, OracleGateway},
        price_tracker::{PriceTracker, PriceTrackerConfig},
        requests::{OracleResult, RequestId},
    };
    pub use crate::protocol::{
        deployment::{ComponentRegistry, Deployment, DeploymentBuilder},
        events::ProtocolEvent,
    };
    pub use crate::utils::crypto::{Address, Hash};
}

/// Protocol version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol name
pub const PROTOCOL_NAME: &str = "synthex";

//! Oracle module for asset and collateral prices.
//!
//! This module provides the price side of the protocol:
//! - The price tracker caching one price per supported asset
//! - Pending oracle requests and their fulfillment payloads
//! - The gateway interface to the oracle network and stable feed
//! - An optional background upkeep service
//!
//! ## Usage
//!
//! ```rust,ignore
//! let id = tracker.update_asset_price(&keeper, "TSLA", &mut gateway, now)?;
//! // ... later, from the oracle node
//! tracker.fulfill(&oracle, &id, &OracleResult::from_price(40))?;
//! assert_eq!(tracker.get_asset_price("TSLA")?, 40);
//! ```

pub mod gateway;
pub mod price_tracker;
pub mod requests;
pub mod service;

pub use gateway::*;
pub use price_tracker::*;
pub use requests::*;
pub use service::{unix_now, KeeperConfig, KeeperStatistics};
#[cfg(feature = "keeper")]
pub use service::UpkeepService;

//! Protocol module - event history and deployment wiring.
//!
//! This module ties the individual components together:
//! - Event types recorded by every component
//! - The component registry the hub coordinates through
//! - A builder for the canonical deployment

pub mod deployment;
pub mod events;

pub use deployment::*;
pub use events::*;

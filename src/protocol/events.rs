//! Protocol events for state change notifications.
//!
//! Each component records its own state transitions in a bounded [`EventLog`],
//! so collateral movements, price refreshes, supply changes and authorized
//! overrides can be audited after the fact.

use serde::{Deserialize, Serialize};

use crate::oracle::requests::RequestId;
use crate::utils::constants::DEFAULT_MAX_EVENTS;
use crate::utils::crypto::{Address, Hash};

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// All protocol event types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolEvent {
    // Vault Events
    /// Collateral pulled into the pool
    CollateralDeposited {
        /// Depositor
        depositor: Address,
        /// Amount deposited
        amount: u64,
        /// Position after the deposit
        new_position: u64,
    },
    /// Collateral returned from the pool
    CollateralWithdrawn {
        /// Depositor
        depositor: Address,
        /// Amount withdrawn
        amount: u64,
        /// Position after the withdrawal
        new_position: u64,
    },
    /// Position overwritten by the hub
    CollateralOverwritten {
        /// Affected user
        user: Address,
        /// Position before
        previous: u64,
        /// Position after
        new_position: u64,
    },

    // Price Tracker Events
    /// Asset appended to the supported list
    AssetAdded {
        /// Symbol
        symbol: String,
    },
    /// Oracle request issued
    PriceRequested {
        /// Request identifier
        request_id: RequestId,
        /// Symbol
        symbol: String,
    },
    /// Oracle request fulfilled
    PriceFulfilled {
        /// Request identifier
        request_id: RequestId,
        /// Symbol
        symbol: String,
        /// New price
        price: u64,
    },
    /// Stable collateral price read from the feed
    StablePriceUpdated {
        /// New price
        price: u64,
    },
    /// Price set directly by the owner
    PriceOverridden {
        /// Symbol, `None` for the stable collateral price
        symbol: Option<String>,
        /// New price
        price: u64,
    },
    /// Automated refresh executed
    UpkeepPerformed {
        /// Upkeep timestamp
        timestamp: u64,
        /// Number of asset requests issued
        requests: usize,
    },
    /// Tracker paused
    Paused {
        /// Caller
        by: Address,
    },
    /// Tracker resumed
    Unpaused {
        /// Caller
        by: Address,
    },

    // Supply Events
    /// Synthetic units minted
    SynthMinted {
        /// Symbol
        symbol: String,
        /// Recipient
        to: Address,
        /// Amount
        amount: u64,
    },
    /// Synthetic units burned
    SynthBurned {
        /// Symbol
        symbol: String,
        /// Holder
        from: Address,
        /// Amount
        amount: u64,
    },
    /// Eligible-to-burn overridden independently of balance
    EligibilityOverridden {
        /// Symbol
        symbol: String,
        /// Holder
        user: Address,
        /// Eligibility before
        previous: u64,
        /// Eligibility after
        new_amount: u64,
        /// Balance at the time of the override
        balance: u64,
    },

    // Hub Events
    /// Hub position bookkeeping changed
    PositionChanged {
        /// Symbol
        symbol: String,
        /// User
        user: Address,
        /// New position amount
        position: u64,
        /// New total value minted
        total_value_minted: u128,
    },

    // Configuration Events
    /// A collaborator or role address changed
    AddressUpdated {
        /// Which slot changed
        slot: String,
        /// New address
        address: Address,
    },
}

impl ProtocolEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::CollateralDeposited { .. } => "CollateralDeposited",
            Self::CollateralWithdrawn { .. } => "CollateralWithdrawn",
            Self::CollateralOverwritten { .. } => "CollateralOverwritten",
            Self::AssetAdded { .. } => "AssetAdded",
            Self::PriceRequested { .. } => "PriceRequested",
            Self::PriceFulfilled { .. } => "PriceFulfilled",
            Self::StablePriceUpdated { .. } => "StablePriceUpdated",
            Self::PriceOverridden { .. } => "PriceOverridden",
            Self::UpkeepPerformed { .. } => "UpkeepPerformed",
            Self::Paused { .. } => "Paused",
            Self::Unpaused { .. } => "Unpaused",
            Self::SynthMinted { .. } => "SynthMinted",
            Self::SynthBurned { .. } => "SynthBurned",
            Self::EligibilityOverridden { .. } => "EligibilityOverridden",
            Self::PositionChanged { .. } => "PositionChanged",
            Self::AddressUpdated { .. } => "AddressUpdated",
        }
    }

    /// Hash of the serialized event
    pub fn hash(&self) -> Hash {
        // Serializing a plain enum of owned fields cannot fail
        let bytes = bincode::serialize(self).unwrap_or_default();
        Hash::sha256(&bytes)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT LOG
// ═══════════════════════════════════════════════════════════════════════════════

/// Bounded event history kept by each component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<ProtocolEvent>,
    max_events: usize,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    /// Create a new empty event log
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_EVENTS)
    }

    /// Create a log keeping at most `max_events` entries
    pub fn with_capacity(max_events: usize) -> Self {
        Self {
            events: Vec::new(),
            max_events: max_events.max(1),
        }
    }

    /// Add an event (with pruning)
    pub fn push(&mut self, event: ProtocolEvent) {
        self.events.push(event);

        if self.events.len() > self.max_events {
            self.events.drain(0..self.events.len() - self.max_events);
        }
    }

    /// Get all retained events
    pub fn events(&self) -> &[ProtocolEvent] {
        &self.events
    }

    /// Most recent event
    pub fn last(&self) -> Option<&ProtocolEvent> {
        self.events.last()
    }

    /// Get events of a specific type
    pub fn filter_by_type(&self, event_type: &str) -> Vec<&ProtocolEvent> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Get the number of retained events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

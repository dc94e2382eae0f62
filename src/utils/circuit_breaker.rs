//! Circuit breaker for the price-refresh surface.
//!
//! A two-state breaker (`Running` / `Paused`) with guarded transitions:
//! pausing a paused breaker or resuming a running one is an error, and every
//! request rejected while paused is counted so the breaker stays observable.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// CIRCUIT STATE
// ═══════════════════════════════════════════════════════════════════════════════

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CircuitState {
    /// Normal operation
    #[default]
    Running,
    /// Refreshes rejected until resumed
    Paused,
}

impl CircuitState {
    /// Check if requests are allowed
    pub fn allows_request(&self) -> bool {
        matches!(self, CircuitState::Running)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CIRCUIT BREAKER
// ═══════════════════════════════════════════════════════════════════════════════

/// Pause switch with transition bookkeeping
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CircuitBreaker {
    /// Current state
    state: CircuitState,
    /// Timestamp of the last pause, if paused
    paused_at: Option<u64>,
    /// Times the breaker was paused
    times_paused: u64,
    /// Requests rejected while paused
    rejected: u64,
}

impl CircuitBreaker {
    /// Create a running breaker
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current state
    pub fn state(&self) -> CircuitState {
        self.state
    }

    /// Whether the breaker is paused
    pub fn is_paused(&self) -> bool {
        self.state == CircuitState::Paused
    }

    /// Running → Paused
    pub fn pause(&mut self, now: u64) -> Result<()> {
        if self.is_paused() {
            return Err(Error::AlreadyPaused);
        }
        self.state = CircuitState::Paused;
        self.paused_at = Some(now);
        self.times_paused += 1;
        Ok(())
    }

    /// Paused → Running
    pub fn unpause(&mut self) -> Result<()> {
        if !self.is_paused() {
            return Err(Error::NotPaused);
        }
        self.state = CircuitState::Running;
        self.paused_at = None;
        Ok(())
    }

    /// Fail with [`Error::Paused`] (and count the rejection) unless running
    pub fn ensure_running(&mut self) -> Result<()> {
        if !self.state.allows_request() {
            self.rejected += 1;
            return Err(Error::Paused);
        }
        Ok(())
    }

    /// Get statistics
    pub fn statistics(&self) -> CircuitBreakerStatistics {
        CircuitBreakerStatistics {
            state: self.state,
            paused_at: self.paused_at,
            times_paused: self.times_paused,
            rejected: self.rejected,
        }
    }
}

/// Public statistics snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerStatistics {
    /// Current state
    pub state: CircuitState,
    /// Timestamp of the current pause
    pub paused_at: Option<u64>,
    /// Times paused
    pub times_paused: u64,
    /// Requests rejected while paused
    pub rejected: u64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let cb = CircuitBreaker::new();
        assert_eq!(cb.state(), CircuitState::Running);
        assert!(!cb.is_paused());
    }

    #[test]
    fn test_guarded_transitions() {
        let mut cb = CircuitBreaker::new();

        assert_eq!(cb.unpause(), Err(Error::NotPaused));
        cb.pause(10).unwrap();
        assert_eq!(cb.pause(11), Err(Error::AlreadyPaused));
        assert_eq!(cb.statistics().paused_at, Some(10));

        cb.unpause().unwrap();
        assert_eq!(cb.unpause(), Err(Error::NotPaused));
        assert_eq!(cb.state(), CircuitState::Running);
    }

    #[test]
    fn test_rejections_counted() {
        let mut cb = CircuitBreaker::new();
        assert!(cb.ensure_running().is_ok());

        cb.pause(0).unwrap();
        assert_eq!(cb.ensure_running(), Err(Error::Paused));
        assert_eq!(cb.ensure_running(), Err(Error::Paused));

        let stats = cb.statistics();
        assert_eq!(stats.rejected, 2);
        assert_eq!(stats.times_paused, 1);
    }
}

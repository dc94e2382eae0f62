//! Background upkeep service.
//!
//! Polls a shared [`Deployment`] at a fixed cadence and runs the price
//! tracker's automated refresh whenever `check_upkeep` reports it is due.
//! The core stays correct with zero polls; this only replaces an external
//! automation network when running the protocol as a long-lived process.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use synthex::oracle::service::{KeeperConfig, UpkeepService};
//!
//! let service = UpkeepService::new(KeeperConfig::new(keeper), deployment, gateway);
//! let handle = service.start();
//! // ...
//! service.stop().await;
//! handle.await?;
//! ```

#[cfg(feature = "keeper")]
use std::sync::Arc;
#[cfg(feature = "keeper")]
use tokio::sync::RwLock;
#[cfg(feature = "keeper")]
use tokio::time::{interval, Duration};

use serde::{Deserialize, Serialize};

#[cfg(feature = "keeper")]
use crate::error::Result;
#[cfg(feature = "keeper")]
use crate::oracle::gateway::OracleGateway;
#[cfg(feature = "keeper")]
use crate::oracle::requests::RequestId;
#[cfg(feature = "keeper")]
use crate::protocol::deployment::Deployment;
use crate::utils::crypto::Address;

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Configuration for the upkeep service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeeperConfig {
    /// Seconds between `check_upkeep` polls
    pub poll_interval_secs: u64,
    /// Identity the refreshes are performed as (the keepers registry)
    pub caller: Address,
}

impl KeeperConfig {
    /// Poll every 10 seconds as `caller`
    pub fn new(caller: Address) -> Self {
        Self {
            poll_interval_secs: 10,
            caller,
        }
    }

    /// Use a custom poll cadence
    pub fn with_poll_interval(mut self, secs: u64) -> Self {
        self.poll_interval_secs = secs.max(1);
        self
    }
}

/// Upkeep service statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeeperStatistics {
    /// Polls executed
    pub checks: u64,
    /// Upkeeps performed
    pub upkeeps: u64,
    /// Upkeeps that failed
    pub failures: u64,
    /// Oracle requests issued by upkeeps
    pub requests_issued: u64,
    /// Timestamp of the last successful upkeep
    pub last_upkeep: Option<u64>,
    /// Is service running
    pub is_running: bool,
}

/// Current wall-clock time in unix seconds
pub fn unix_now() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}

// ═══════════════════════════════════════════════════════════════════════════════
// UPKEEP SERVICE
// ═══════════════════════════════════════════════════════════════════════════════

/// Background poller driving `check_upkeep` / `perform_upkeep`
#[cfg(feature = "keeper")]
pub struct UpkeepService<G> {
    config: KeeperConfig,
    deployment: Arc<RwLock<Deployment>>,
    gateway: Arc<RwLock<G>>,
    stats: Arc<RwLock<KeeperStatistics>>,
    shutdown: Arc<RwLock<bool>>,
}

#[cfg(feature = "keeper")]
impl<G> UpkeepService<G>
where
    G: OracleGateway + Send + Sync + 'static,
{
    /// Create a service over a shared deployment and gateway
    pub fn new(config: KeeperConfig, deployment: Arc<RwLock<Deployment>>, gateway: Arc<RwLock<G>>) -> Self {
        Self {
            config,
            deployment,
            gateway,
            stats: Arc::new(RwLock::new(KeeperStatistics::default())),
            shutdown: Arc::new(RwLock::new(false)),
        }
    }

    /// Run one poll at `now`
    pub async fn poll_once(&self, now: u64) -> Result<Option<Vec<RequestId>>> {
        poll(&self.config, &self.deployment, &self.gateway, &self.stats, now).await
    }

    /// Start polling (returns immediately, runs in background)
    pub fn start(&self) -> tokio::task::JoinHandle<()> {
        let config = self.config.clone();
        let deployment = Arc::clone(&self.deployment);
        let gateway = Arc::clone(&self.gateway);
        let stats = Arc::clone(&self.stats);
        let shutdown = Arc::clone(&self.shutdown);

        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(config.poll_interval_secs));
            stats.write().await.is_running = true;

            loop {
                ticker.tick().await;

                if *shutdown.read().await {
                    break;
                }

                // Failures are counted in the statistics and logged by `poll`
                let _ = poll(&config, &deployment, &gateway, &stats, unix_now()).await;
            }

            stats.write().await.is_running = false;
        })
    }

    /// Stop the service after the current tick
    pub async fn stop(&self) {
        *self.shutdown.write().await = true;
    }

    /// Get statistics
    pub async fn statistics(&self) -> KeeperStatistics {
        self.stats.read().await.clone()
    }
}

#[cfg(feature = "keeper")]
async fn poll<G: OracleGateway>(
    config: &KeeperConfig,
    deployment: &RwLock<Deployment>,
    gateway: &RwLock<G>,
    stats: &RwLock<KeeperStatistics>,
    now: u64,
) -> Result<Option<Vec<RequestId>>> {
    let mut d = deployment.write().await;
    let mut g = gateway.write().await;
    let outcome = d.run_upkeep(&config.caller, &mut *g, now);

    let mut s = stats.write().await;
    s.checks += 1;
    match &outcome {
        Ok(Some(ids)) => {
            s.upkeeps += 1;
            s.requests_issued += ids.len() as u64;
            s.last_upkeep = Some(now);
            tracing::info!(timestamp = now, requests = ids.len(), "keeper performed upkeep");
        }
        Ok(None) => {}
        Err(e) => {
            s.failures += 1;
            tracing::warn!(timestamp = now, error = %e, "keeper upkeep failed");
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeper_config() {
        let keeper = Address::from_label("keepers");
        let config = KeeperConfig::new(keeper).with_poll_interval(0);
        assert_eq!(config.poll_interval_secs, 1);
        assert_eq!(config.caller, keeper);
    }

    #[test]
    fn test_unix_now_is_recent() {
        // 2020-01-01
        assert!(unix_now() > 1_577_836_800);
    }

    #[cfg(feature = "keeper")]
    mod keeper {
        use super::*;
        use crate::oracle::gateway::MockOracleGateway;
        use crate::protocol::deployment::DeploymentBuilder;

        fn service() -> UpkeepService<MockOracleGateway> {
            let deployment = DeploymentBuilder::new(Address::from_label("owner"))
                .asset("TSLA", "Synthetic Tesla")
                .build(0)
                .unwrap();
            let caller = deployment.addresses.keepers_registry;

            UpkeepService::new(
                KeeperConfig::new(caller),
                Arc::new(RwLock::new(deployment)),
                Arc::new(RwLock::new(MockOracleGateway::new(1))),
            )
        }

        #[test]
        fn test_poll_once() {
            let service = service();

            tokio_test::block_on(async {
                assert_eq!(service.poll_once(30).await.unwrap(), None);
                let ids = service.poll_once(61).await.unwrap().unwrap();
                assert_eq!(ids.len(), 1);

                let stats = service.statistics().await;
                assert_eq!(stats.checks, 2);
                assert_eq!(stats.upkeeps, 1);
                assert_eq!(stats.last_upkeep, Some(61));
            });
        }

        #[test]
        fn test_poll_counts_failures() {
            let service = service();

            tokio_test::block_on(async {
                service.gateway.write().await.fail_with("node offline");
                assert!(service.poll_once(61).await.is_err());
                assert_eq!(service.statistics().await.failures, 1);
            });
        }
    }
}

//! Change propagation polling
//!
//! After a change is accepted the provider applies it asynchronously. The
//! waiter polls its status at a fixed interval until the provider reports
//! it in sync.
//!
//! ## Failure budget
//!
//! Failed status queries are tolerated until more than `max_failures` have
//! been recorded in one wait. With [`FailureCounting::Cumulative`] (the
//! default) a successful `Pending` reply does not reset the counter, so the
//! budget covers the whole wait. There is no wall-clock limit: a provider
//! that answers `Pending` forever is polled forever.

use crate::config::{FailureCounting, PropagationConfig};
use crate::error::{Error, Result};
use crate::record::{ChangeHandle, PropagationStatus};
use crate::traits::DnsChangeClient;
use std::time::Duration;
use tracing::{debug, error, info};

/// Polls a submitted change until it is in sync
#[derive(Debug, Clone)]
pub struct PropagationWaiter {
    interval: Duration,
    max_failures: usize,
    counting: FailureCounting,
}

impl PropagationWaiter {
    /// Create a waiter
    ///
    /// # Parameters
    ///
    /// - `interval`: Sleep before every status query
    /// - `max_failures`: Failed queries tolerated; one more is fatal
    /// - `counting`: Whether successful queries reset the failure counter
    pub fn new(interval: Duration, max_failures: usize, counting: FailureCounting) -> Self {
        Self {
            interval,
            max_failures,
            counting,
        }
    }

    /// Create a waiter from configuration
    pub fn from_config(config: &PropagationConfig) -> Self {
        Self::new(
            Duration::from_secs(config.poll_interval_secs),
            config.max_poll_failures,
            config.failure_counting,
        )
    }

    /// Poll interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Block until the change is in sync
    ///
    /// This is not interruptible: a termination signal arriving meanwhile
    /// stays queued until the wait returns.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The provider reported the change in sync
    /// - `Err(Error::PropagationExhausted)`: The failure budget was exceeded
    pub async fn await_sync(&self, client: &dyn DnsChangeClient, handle: &ChangeHandle) -> Result<()> {
        let mut failures = 0usize;
        let mut polls = 0usize;

        loop {
            tokio::time::sleep(self.interval).await;
            polls += 1;

            match client.poll(handle).await {
                Ok(PropagationStatus::InSync) => {
                    info!("Change {} in sync after {} poll(s)", handle, polls);
                    return Ok(());
                }
                Ok(PropagationStatus::Pending) => {
                    if self.counting == FailureCounting::Consecutive {
                        failures = 0;
                    }
                    info!("Change {} not yet propagated (Pending)...", handle);
                }
                Err(e) => {
                    failures += 1;
                    error!(
                        "Failed getting status of change {} ({} of {} tolerated): {}",
                        handle, failures, self.max_failures, e
                    );

                    if failures > self.max_failures {
                        return Err(Error::PropagationExhausted {
                            failures,
                            last_error: e.to_string(),
                        });
                    }
                    debug!("Retrying status query in {:?}", self.interval);
                }
            }
        }
    }
}

impl Default for PropagationWaiter {
    fn default() -> Self {
        Self::from_config(&PropagationConfig::default())
    }
}

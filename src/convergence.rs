//! Distributed configuration convergence.
//!
//! After a configuration property is written, components across the cluster
//! fetch their own local copies and may lag. This waits until every named
//! component reports the desired value. The loop is bounded with a real sleep
//! and a deadline; the upstream behavior this replaces spun without either,
//! which is the documented liveness defect, not a behavior worth keeping.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::clients::ComponentConfigAdmin;
use crate::error::{Result, SyncError};
use crate::shutdown::Shutdown;

pub struct ConvergenceWaiter {
    config_admin: Arc<dyn ComponentConfigAdmin>,
    shutdown: Shutdown,
}

impl ConvergenceWaiter {
    pub fn new(config_admin: Arc<dyn ComponentConfigAdmin>, shutdown: Shutdown) -> Self {
        Self {
            config_admin,
            shutdown,
        }
    }

    /// Wait until every component in `components` reports `desired` for
    /// `key`, polling at `poll_interval`, for at most `timeout`.
    pub async fn wait_for_property(
        &self,
        components: &[String],
        key: &str,
        desired: &str,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<()> {
        if components.is_empty() {
            return Err(SyncError::Config(format!(
                "no components to wait on for property '{key}'"
            )));
        }

        let deadline = Instant::now() + timeout;
        let mut shutdown = self.shutdown.clone();

        loop {
            if shutdown.is_shutdown() {
                return Err(SyncError::Cancelled);
            }

            if self.all_converged(components, key, desired).await {
                debug!("Property {}={} converged on all components", key, desired);
                return Ok(());
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(SyncError::ConvergenceTimeout {
                    what: format!("property {key}={desired} on {} components", components.len()),
                    waited: timeout,
                });
            }
            if !shutdown.sleep(remaining.min(poll_interval)).await {
                return Err(SyncError::Cancelled);
            }
        }
    }

    async fn all_converged(&self, components: &[String], key: &str, desired: &str) -> bool {
        for component in components {
            match self.config_admin.get_property(component, key).await {
                Ok(Some(value)) if value == desired => {}
                Ok(value) => {
                    debug!(
                        "Component {} still reports {}={:?}, want {}",
                        component, key, value, desired
                    );
                    return false;
                }
                Err(e) => {
                    // Unreadable component counts as not converged until the
                    // deadline decides.
                    warn!("Reading {}.{} failed: {:#}", component, key, e);
                    return false;
                }
            }
        }
        true
    }
}

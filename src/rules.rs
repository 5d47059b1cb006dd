//! Flow-rule purge and node resynchronization.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::clients::FlowRuleAdmin;
use crate::driver::NodeStateDriver;
use crate::error::{Result, SyncError};
use crate::node::{ManagedNode, NodeState};
use crate::shutdown::Shutdown;

/// Outcome of a `resync_all` batch. Per-node failures never abort the batch;
/// they accumulate here for the operator.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResyncReport {
    /// Nodes that were forced to INIT and returned to COMPLETE in time.
    pub converged: Vec<String>,
    /// Nodes that were forced but missed the convergence window.
    pub timed_out: Vec<String>,
    /// Nodes skipped because they were not in COMPLETE when the batch ran.
    pub skipped: Vec<String>,
    /// Nodes whose force or poll failed outright, with the error text.
    pub failed: Vec<(String, String)>,
}

impl ResyncReport {
    pub fn all_converged(&self) -> bool {
        self.timed_out.is_empty() && self.failed.is_empty()
    }
}

/// Orchestrates purge-then-reinstall of all flow rules owned by the
/// application, tolerating asynchronous, eventually-consistent rule removal
/// across many switches.
pub struct RuleSynchronizer {
    flow_rules: Arc<dyn FlowRuleAdmin>,
    driver: Arc<NodeStateDriver>,
    poll_interval: Duration,
    node_timeout: Duration,
    throttle: Duration,
    shutdown: Shutdown,
}

impl RuleSynchronizer {
    pub fn new(
        flow_rules: Arc<dyn FlowRuleAdmin>,
        driver: Arc<NodeStateDriver>,
        poll_interval: Duration,
        node_timeout: Duration,
        throttle: Duration,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            flow_rules,
            driver,
            poll_interval,
            node_timeout,
            throttle,
            shutdown,
        }
    }

    /// Bulk-remove every rule owned by `app_id` and poll the remaining count
    /// until it reaches zero or `timeout` elapses. Removal is re-issued on
    /// polls that still see entries, since removal across switches is
    /// asynchronous and idempotent. A deadline miss is reported as
    /// `ConvergenceTimeout`, never as a hang.
    pub async fn purge_and_verify(&self, app_id: &str, timeout: Duration) -> Result<()> {
        // Unknown application: fail fast, never enter the poll loop.
        let registered = self.flow_rules.is_registered(app_id).await.map_err(|e| {
            SyncError::RemoteUnavailable {
                target: "flow rule service".to_string(),
                source: e,
            }
        })?;
        if !registered {
            return Err(SyncError::Config(format!(
                "application '{app_id}' is not registered"
            )));
        }

        let started = tokio::time::Instant::now();
        let deadline = started + timeout;

        info!("Purging all flow rules owned by {}", app_id);
        if let Err(e) = self.flow_rules.remove_rules_by_app(app_id).await {
            warn!("Initial rule removal for {} failed: {:#}", app_id, e);
        }

        let mut shutdown = self.shutdown.clone();
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if !shutdown.sleep(remaining.min(self.poll_interval)).await {
                return Err(SyncError::Cancelled);
            }

            match self.flow_rules.count_rules_by_app(app_id).await {
                Ok(0) => {
                    info!(
                        "All {} rules removed after {:?}",
                        app_id,
                        started.elapsed()
                    );
                    return Ok(());
                }
                Ok(count) => {
                    if tokio::time::Instant::now() >= deadline {
                        return Err(SyncError::ConvergenceTimeout {
                            what: format!("{count} flow rules of {app_id} still installed"),
                            waited: timeout,
                        });
                    }
                    // Some switches have not processed the removal yet.
                    info!("{} rules of {} remaining, re-issuing removal", count, app_id);
                    if let Err(e) = self.flow_rules.remove_rules_by_app(app_id).await {
                        warn!("Rule removal retry for {} failed: {:#}", app_id, e);
                    }
                }
                Err(e) => {
                    if tokio::time::Instant::now() >= deadline {
                        return Err(SyncError::ConvergenceTimeout {
                            what: format!("flow-rule count of {app_id} unavailable"),
                            waited: timeout,
                        });
                    }
                    warn!("Counting rules of {} failed: {:#}", app_id, e);
                }
            }
        }
    }

    /// Force every COMPLETE node back through its setup state machine and
    /// wait (bounded) for each to return to COMPLETE. Nodes are processed one
    /// at a time with a fixed inter-node delay to avoid overwhelming the
    /// control channel; per-node force-then-observe ordering is strict.
    pub async fn resync_all(&self, nodes: &[ManagedNode]) -> Result<ResyncReport> {
        let mut report = ResyncReport::default();
        let mut shutdown = self.shutdown.clone();
        let mut first = true;

        for node in nodes {
            if node.state != NodeState::Complete {
                info!(
                    "Skipping resync of {} (state {}, not COMPLETE)",
                    node.hostname, node.state
                );
                report.skipped.push(node.hostname.clone());
                continue;
            }

            if !first && !shutdown.sleep(self.throttle).await {
                return Err(SyncError::Cancelled);
            }
            first = false;

            match self.driver.force_resync(node).await {
                Ok(_) => {}
                Err(SyncError::Cancelled) => return Err(SyncError::Cancelled),
                Err(e) => {
                    warn!("Forcing resync of {} failed: {}", node.hostname, e);
                    report.failed.push((node.hostname.clone(), e.to_string()));
                    continue;
                }
            }

            match self
                .driver
                .await_complete(&node.hostname, self.node_timeout)
                .await
            {
                Ok(()) => report.converged.push(node.hostname.clone()),
                Err(SyncError::ConvergenceTimeout { .. }) => {
                    warn!(
                        "Node {} did not return to COMPLETE within {:?}",
                        node.hostname, self.node_timeout
                    );
                    report.timed_out.push(node.hostname.clone());
                }
                Err(SyncError::Cancelled) => return Err(SyncError::Cancelled),
                Err(e) => {
                    report.failed.push((node.hostname.clone(), e.to_string()));
                }
            }
        }

        info!(
            "Resync batch done: {} converged, {} timed out, {} skipped, {} failed",
            report.converged.len(),
            report.timed_out.len(),
            report.skipped.len(),
            report.failed.len()
        );
        Ok(report)
    }
}

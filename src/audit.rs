//! Operator audit trail.
//!
//! Administrative actions land on the `audit` tracing target so deployments
//! can route them to a separate sink from diagnostic logs.

use chrono::Utc;
use tracing::info;

use crate::ports::RecoveryReport;
use crate::reconciler::ReconcileReport;
use crate::rules::ResyncReport;

pub struct AuditLogger {
    component: &'static str,
}

impl AuditLogger {
    pub fn new(component: &'static str) -> Self {
        Self { component }
    }

    fn record(&self, message: String) {
        info!(
            target: "audit",
            component = self.component,
            at = %Utc::now().to_rfc3339(),
            "{message}"
        );
    }

    pub fn pass_completed(&self, report: &ReconcileReport) {
        let removed: usize = report.kinds.iter().map(|k| k.removed.len()).sum();
        let failed: usize = report.kinds.iter().map(|k| k.failed.len()).sum();
        self.record(format!(
            "Reconciliation pass completed: noop={}, removed={}, failed={}",
            report.is_noop(),
            removed,
            failed
        ));
    }

    pub fn rules_purged(&self, app_id: &str) {
        self.record(format!("Flow rules purged for application {app_id}"));
    }

    pub fn purge_timed_out(&self, app_id: &str) {
        self.record(format!(
            "Flow rule purge for {app_id} missed its deadline; operator retry required"
        ));
    }

    pub fn resync_completed(&self, report: &ResyncReport) {
        self.record(format!(
            "Node resync completed: {} converged, {} timed out, {} failed",
            report.converged.len(),
            report.timed_out.len(),
            report.failed.len()
        ));
    }

    pub fn ports_recovered(&self, report: &RecoveryReport) {
        self.record(format!(
            "Port recovery swept {} nodes, recreated {} interfaces",
            report.nodes.len(),
            report.total_recovered()
        ));
    }

    pub fn mode_changed(&self, key: &str, value: &str) {
        self.record(format!("Configuration mode changed: {key}={value}"));
    }
}

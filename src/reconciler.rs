//! Drift detection and cache reconciliation.
//!
//! A pass fetches a point-in-time snapshot per resource kind, diffs it
//! against the cache, upserts authoritative records and removes cached IDs
//! the orchestrator no longer knows. Router interfaces are derived from
//! cached ports and routers instead of diffed, because the orchestrator does
//! not expose them as a first-class listable resource.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::clients::OrchestratorClient;
use crate::diff::diff_ids;
use crate::resource::{ResourceKind, ResourceRecord};
use crate::store::{CachedStore, UpsertOutcome};

/// A per-record failure inside a kind (malformed payload, rejected upsert).
#[derive(Debug, Clone, Serialize)]
pub struct ItemFailure {
    pub id: String,
    pub error: String,
}

/// Reconciliation outcome for one resource kind.
#[derive(Debug, Clone, Serialize)]
pub struct KindReport {
    pub kind: ResourceKind,
    pub created: usize,
    pub replaced: usize,
    pub unchanged: usize,
    /// IDs removed from the cache. Reported to the caller, which decides
    /// whether to also request dataplane teardown; nothing is cascaded here.
    pub removed: Vec<String>,
    pub failed: Vec<ItemFailure>,
    /// Set when the authoritative snapshot itself could not be fetched. The
    /// kind is left untouched; other kinds still run.
    pub fetch_error: Option<String>,
}

impl KindReport {
    fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            created: 0,
            replaced: 0,
            unchanged: 0,
            removed: Vec::new(),
            failed: Vec::new(),
            fetch_error: None,
        }
    }

    /// True when the pass wrote nothing for this kind.
    pub fn is_noop(&self) -> bool {
        self.created == 0 && self.replaced == 0 && self.removed.is_empty()
    }
}

/// Outcome of a full reconciliation pass.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub kinds: Vec<KindReport>,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.kinds.iter().all(KindReport::is_noop)
    }

    pub fn kind(&self, kind: ResourceKind) -> Option<&KindReport> {
        self.kinds.iter().find(|k| k.kind == kind)
    }
}

/// Applies create-or-update semantics per resource kind against the cache.
pub struct ResourceReconciler {
    orchestrator: Arc<dyn OrchestratorClient>,
    store: Arc<CachedStore>,
}

impl ResourceReconciler {
    pub fn new(orchestrator: Arc<dyn OrchestratorClient>, store: Arc<CachedStore>) -> Self {
        Self {
            orchestrator,
            store,
        }
    }

    /// Reconcile one kind: upsert every authoritative record, remove cached
    /// IDs absent from the snapshot. A failure on one record is recorded and
    /// the rest of the kind proceeds.
    pub async fn reconcile_kind(&self, kind: ResourceKind) -> KindReport {
        let mut report = KindReport::new(kind);

        let records = match self.orchestrator.list_resources(kind).await {
            Ok(records) => records,
            Err(e) => {
                error!("Fetching {} snapshot failed: {:#}", kind, e);
                report.fetch_error = Some(format!("{e:#}"));
                return report;
            }
        };

        // Snapshot keyed by ID; records without a usable ID become per-item
        // failures instead of silently vanishing from the diff.
        let mut snapshot: HashMap<String, ResourceRecord> = HashMap::with_capacity(records.len());
        for record in records {
            if record.id.trim().is_empty() {
                report.failed.push(ItemFailure {
                    id: String::new(),
                    error: format!("{kind} record without an ID"),
                });
                continue;
            }
            snapshot.insert(record.id.clone(), record);
        }

        let cached_ids = self.store.ids(kind).await;
        let snapshot_ids = snapshot.keys().cloned().collect();
        let diff = diff_ids(&cached_ids, &snapshot_ids);

        for record in snapshot.into_values() {
            let id = record.id.clone();
            match self.store.upsert(record).await {
                Ok(UpsertOutcome::Created) => report.created += 1,
                Ok(UpsertOutcome::Replaced) => report.replaced += 1,
                Ok(UpsertOutcome::Unchanged) => report.unchanged += 1,
                Err(e) => {
                    warn!("Upserting {} {} failed: {}", kind, id, e);
                    report.failed.push(ItemFailure {
                        id,
                        error: e.to_string(),
                    });
                }
            }
        }

        for id in diff.missing_from_authoritative {
            if self.store.remove(kind, &id).await.is_some() {
                report.removed.push(id);
            }
        }

        if !report.is_noop() {
            info!(
                "Reconciled {}: {} created, {} replaced, {} removed, {} failed",
                kind,
                report.created,
                report.replaced,
                report.removed.len(),
                report.failed.len()
            );
        }
        report
    }

    /// Recompute the derived router-interface set from cached ports and
    /// routers. A router interface is materialized only when a cached port's
    /// device owner marks it as one and its device ID names a known router.
    pub async fn derive_router_interfaces(&self) -> KindReport {
        let kind = ResourceKind::RouterInterface;
        let mut report = KindReport::new(kind);

        let router_ids = self.store.ids(ResourceKind::Router).await;
        let ports = self.store.list(ResourceKind::Port).await;

        let mut desired: HashMap<String, ResourceRecord> = HashMap::new();
        for port in ports {
            if !port.is_router_interface() {
                continue;
            }
            match port.device_id() {
                Some(router_id) if router_ids.contains(router_id) => {
                    desired.insert(
                        port.id.clone(),
                        ResourceRecord::new(kind, port.id.clone(), port.payload.clone()),
                    );
                }
                Some(router_id) => {
                    // Port claims a router the cache does not know; not an
                    // interface until the router shows up.
                    warn!(
                        "Router-interface port {} references unknown router {}",
                        port.id, router_id
                    );
                }
                None => {
                    report.failed.push(ItemFailure {
                        id: port.id.clone(),
                        error: "router-interface port without device_id".to_string(),
                    });
                }
            }
        }

        let cached_ids = self.store.ids(kind).await;
        let desired_ids = desired.keys().cloned().collect();
        let diff = diff_ids(&cached_ids, &desired_ids);

        for record in desired.into_values() {
            let id = record.id.clone();
            match self.store.upsert(record).await {
                Ok(UpsertOutcome::Created) => report.created += 1,
                Ok(UpsertOutcome::Replaced) => report.replaced += 1,
                Ok(UpsertOutcome::Unchanged) => report.unchanged += 1,
                Err(e) => report.failed.push(ItemFailure {
                    id,
                    error: e.to_string(),
                }),
            }
        }

        for id in diff.missing_from_authoritative {
            if self.store.remove(kind, &id).await.is_some() {
                report.removed.push(id);
            }
        }

        report
    }

    /// One full diff-and-upsert cycle across all resource kinds. Kinds are
    /// isolated: a snapshot failure on one never prevents the others.
    pub async fn run_pass(&self) -> ReconcileReport {
        let started_at = Utc::now();
        let mut kinds = Vec::with_capacity(ResourceKind::ALL.len());

        for kind in ResourceKind::SYNCED {
            kinds.push(self.reconcile_kind(kind).await);
        }
        // Derived last, from whatever ports and routers the pass produced.
        kinds.push(self.derive_router_interfaces().await);

        ReconcileReport {
            started_at,
            finished_at: Utc::now(),
            kinds,
        }
    }
}

//! Top-level engine: wires the components together and exposes the
//! administrative operations consumed by the CLI/API layer.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::audit::AuditLogger;
use crate::clients::Collaborators;
use crate::config::EngineConfig;
use crate::convergence::ConvergenceWaiter;
use crate::driver::NodeStateDriver;
use crate::error::{Result, SyncError};
use crate::events::EventBus;
use crate::node::ManagedNode;
use crate::ports::{PortRecoveryEngine, RecoveryReport};
use crate::reconciler::{ReconcileReport, ResourceReconciler};
use crate::rules::{ResyncReport, RuleSynchronizer};
use crate::shutdown::{self, ShutdownHandle};
use crate::store::CachedStore;

/// ARP handling mode of the switching dataplane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpMode {
    Proxy,
    Broadcast,
}

impl ArpMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArpMode::Proxy => "proxy",
            ArpMode::Broadcast => "broadcast",
        }
    }
}

impl std::str::FromStr for ArpMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "proxy" => Ok(ArpMode::Proxy),
            "broadcast" => Ok(ArpMode::Broadcast),
            other => Err(format!("unknown ARP mode '{other}'")),
        }
    }
}

/// Property keys written by mode switches.
pub const ARP_MODE_KEY: &str = "arp_mode";
pub const STATEFUL_SNAT_KEY: &str = "use_stateful_snat";

/// The consistency engine. One instance per controller process; operations
/// are invoked synchronously by administrative calls, not by a background
/// scheduler.
pub struct SyncEngine {
    cfg: EngineConfig,
    collaborators: Collaborators,
    store: Arc<CachedStore>,
    bus: EventBus,
    audit: AuditLogger,
    reconciler: ResourceReconciler,
    rules: RuleSynchronizer,
    recovery: PortRecoveryEngine,
    waiter: ConvergenceWaiter,
    shutdown: ShutdownHandle,
}

impl SyncEngine {
    pub fn new(cfg: EngineConfig, collaborators: Collaborators) -> Self {
        let (shutdown_handle, shutdown) = shutdown::channel();
        let store = Arc::new(CachedStore::new());
        let bus = EventBus::new(cfg.event_capacity);

        let driver = Arc::new(NodeStateDriver::new(
            Arc::clone(&collaborators.nodes),
            bus.clone(),
            cfg.node_poll_interval(),
            shutdown.clone(),
        ));
        let reconciler = ResourceReconciler::new(
            Arc::clone(&collaborators.orchestrator),
            Arc::clone(&store),
        );
        let rules = RuleSynchronizer::new(
            Arc::clone(&collaborators.flow_rules),
            driver,
            cfg.rule_poll_interval(),
            cfg.node_resync_timeout(),
            cfg.resync_throttle(),
            shutdown.clone(),
        );
        let recovery = PortRecoveryEngine::new(
            Arc::clone(&collaborators.orchestrator),
            Arc::clone(&collaborators.port_inspector),
            Arc::clone(&collaborators.switch_admin),
        );
        let waiter = ConvergenceWaiter::new(Arc::clone(&collaborators.config_admin), shutdown);

        Self {
            cfg,
            collaborators,
            store,
            bus,
            audit: AuditLogger::new("sync-engine"),
            reconciler,
            rules,
            recovery,
            waiter,
            shutdown: shutdown_handle,
        }
    }

    /// Read access to the cache for presentation layers.
    pub fn store(&self) -> &Arc<CachedStore> {
        &self.store
    }

    /// Subscribe to node lifecycle events.
    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    /// Interrupt every in-flight convergence wait.
    pub fn shutdown(&self) {
        self.shutdown.shutdown();
    }

    /// One full reconciliation pass across all resource kinds.
    pub async fn reconcile(&self) -> ReconcileReport {
        let report = self.reconciler.run_pass().await;
        self.audit.pass_completed(&report);
        report
    }

    /// Purge all application flow rules and verify removal converges,
    /// without forcing a resync.
    pub async fn purge_rules(&self, timeout: Duration) -> Result<()> {
        match self.rules.purge_and_verify(&self.cfg.app_id, timeout).await {
            Ok(()) => {
                self.audit.rules_purged(&self.cfg.app_id);
                Ok(())
            }
            Err(e @ SyncError::ConvergenceTimeout { .. }) => {
                self.audit.purge_timed_out(&self.cfg.app_id);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Purge all application flow rules, then walk every COMPLETE dataplane
    /// node back through its setup state machine so mode-specific handlers
    /// reinstall them.
    pub async fn purge_and_resync(&self, timeout: Duration) -> Result<ResyncReport> {
        self.purge_rules(timeout).await?;

        let nodes = self.dataplane_nodes().await?;
        let report = self.rules.resync_all(&nodes).await?;
        self.audit.resync_completed(&report);
        Ok(report)
    }

    /// Recover detached dataplane ports on one node, or sweep all dataplane
    /// nodes when no hostname is given.
    pub async fn recover_ports(&self, hostname: Option<&str>) -> Result<RecoveryReport> {
        let nodes = match hostname {
            Some(hostname) => {
                let node = self
                    .collaborators
                    .nodes
                    .get_node(hostname)
                    .await
                    .map_err(|e| SyncError::RemoteUnavailable {
                        target: "node admin".to_string(),
                        source: e,
                    })?
                    .ok_or_else(|| SyncError::Config(format!("node {hostname} not found")))?;
                vec![node]
            }
            None => self.dataplane_nodes().await?,
        };

        let report = self.recovery.recover_all(&nodes).await?;
        self.audit.ports_recovered(&report);
        Ok(report)
    }

    /// Switch the dataplane ARP handling mode: write the property on every
    /// switching component, wait until they all report it, purge stale rules
    /// and force a full resync so handlers reinstall mode-specific rules.
    pub async fn set_arp_mode(&self, mode: ArpMode) -> Result<ResyncReport> {
        self.set_mode_property(&self.cfg.switching_components, ARP_MODE_KEY, mode.as_str())
            .await
    }

    /// Toggle stateful SNAT on the routing components, then converge, purge
    /// and resync exactly like an ARP mode switch.
    pub async fn set_stateful_snat(&self, enabled: bool) -> Result<ResyncReport> {
        let value = if enabled { "true" } else { "false" };
        self.set_mode_property(&self.cfg.routing_components, STATEFUL_SNAT_KEY, value)
            .await
    }

    async fn set_mode_property(
        &self,
        components: &[String],
        key: &str,
        value: &str,
    ) -> Result<ResyncReport> {
        for component in components {
            self.collaborators
                .config_admin
                .set_property(component, key, value)
                .await
                .map_err(|e| SyncError::RemoteUnavailable {
                    target: format!("config admin for {component}"),
                    source: e,
                })?;
        }

        info!("Wrote {}={} to {} components", key, value, components.len());
        self.waiter
            .wait_for_property(
                components,
                key,
                value,
                self.cfg.property_poll_interval(),
                self.cfg.property_timeout(),
            )
            .await?;
        self.audit.mode_changed(key, value);

        self.purge_and_resync(self.cfg.rule_purge_timeout()).await
    }

    async fn dataplane_nodes(&self) -> Result<Vec<ManagedNode>> {
        let nodes = self
            .collaborators
            .nodes
            .list_nodes(None)
            .await
            .map_err(|e| SyncError::RemoteUnavailable {
                target: "node admin".to_string(),
                source: e,
            })?;
        Ok(nodes.into_iter().filter(ManagedNode::is_dataplane).collect())
    }
}

//! Dataplane port recovery.
//!
//! Detects interfaces that exist in the orchestrator's model but are missing
//! from a node's live integration bridge (typically after a switch agent lost
//! its control channel and dropped ports), and recreates them with the
//! metadata higher layers use to bind them.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::clients::{
    InterfaceMetadata, OrchestratorClient, SwitchAdminClient, SwitchPortInspector,
};
use crate::error::{Result, SyncError};
use crate::node::ManagedNode;
use crate::resource::{ResourceKind, ResourceRecord};

/// Prefix of derived dataplane port names.
pub const VPORT_PREFIX: &str = "tap";

/// Number of leading orchestrator-port-ID characters carried in the name.
pub const VPORT_ID_LEN: usize = 11;

/// Derive the dataplane port name for an orchestrator port ID.
///
/// Version 1 of the naming contract: `"tap"` followed by the first eleven
/// characters of the port ID. The live switch agent computes the same name
/// independently, without coordination; the transform is not reversible
/// without the port list. Changing this breaks detection for every port
/// created under the old rule.
pub fn vport_name(port_id: &str) -> String {
    let head: String = port_id.chars().take(VPORT_ID_LEN).collect();
    format!("{VPORT_PREFIX}{head}")
}

/// One node's recovery outcome.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NodeRecovery {
    pub hostname: String,
    /// Derived names of interfaces recreated on the bridge.
    pub recovered: Vec<String>,
    /// Derived names found already present (idempotent no-ops).
    pub already_present: Vec<String>,
    /// Set when the node's switch endpoint could not be reached; the rest of
    /// the multi-node operation proceeds regardless.
    pub unreachable: bool,
    /// Per-port failures (orchestrator port ID, error text).
    pub failed: Vec<(String, String)>,
}

/// Aggregate over a multi-node recovery sweep.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecoveryReport {
    pub nodes: Vec<NodeRecovery>,
}

impl RecoveryReport {
    pub fn total_recovered(&self) -> usize {
        self.nodes.iter().map(|n| n.recovered.len()).sum()
    }
}

pub struct PortRecoveryEngine {
    orchestrator: Arc<dyn OrchestratorClient>,
    inspector: Arc<dyn SwitchPortInspector>,
    switch_admin: Arc<dyn SwitchAdminClient>,
}

impl PortRecoveryEngine {
    pub fn new(
        orchestrator: Arc<dyn OrchestratorClient>,
        inspector: Arc<dyn SwitchPortInspector>,
        switch_admin: Arc<dyn SwitchAdminClient>,
    ) -> Self {
        Self {
            orchestrator,
            inspector,
            switch_admin,
        }
    }

    /// Orchestrator ports that should be realized on this node: bound to its
    /// hostname and owned by a live VM.
    async fn expected_ports(&self, node: &ManagedNode) -> Result<Vec<ResourceRecord>> {
        let ports = self
            .orchestrator
            .list_resources(ResourceKind::Port)
            .await
            .map_err(SyncError::Orchestrator)?;

        Ok(ports
            .into_iter()
            .filter(|p| p.host_binding() == Some(node.hostname.as_str()) && p.is_vm_port())
            .collect())
    }

    /// Names currently live on the node's integration bridge.
    async fn actual_names(&self, node: &ManagedNode) -> Result<HashSet<String>> {
        let ports = self.inspector.list_ports(node).await.map_err(|e| {
            SyncError::RemoteUnavailable {
                target: format!("switch on {}", node.hostname),
                source: e,
            }
        })?;
        Ok(ports.into_iter().map(|p| p.name).collect())
    }

    /// Expected-but-missing ports on one node. An unreachable node surfaces
    /// as `RemoteUnavailable` here; `recover_node` turns that into an empty
    /// recovery set rather than failing a sweep.
    pub async fn find_detached(&self, node: &ManagedNode) -> Result<Vec<ResourceRecord>> {
        let actual = self.actual_names(node).await?;
        let expected = self.expected_ports(node).await?;

        Ok(expected
            .into_iter()
            .filter(|port| !actual.contains(&vport_name(&port.id)))
            .collect())
    }

    /// Recreate one port's interface on the node's bridge. Idempotent: if the
    /// derived name is already present the call is a no-op and returns
    /// `false`.
    pub async fn recover(&self, node: &ManagedNode, port: &ResourceRecord) -> Result<bool> {
        let name = vport_name(&port.id);

        // Check before create so a second recovery of the same port observes
        // the interface and does nothing.
        if self.actual_names(node).await?.contains(&name) {
            info!("Port {} already present on {}, skipping", name, node.hostname);
            return Ok(false);
        }

        let metadata = interface_metadata(port)?;
        self.switch_admin
            .create_interface(node, &name, &metadata)
            .await
            .map_err(|e| SyncError::RemoteUnavailable {
                target: format!("switch on {}", node.hostname),
                source: e,
            })?;

        info!(
            "Recovered port {} on {} (vm {})",
            name, node.hostname, metadata.vm_id
        );
        Ok(true)
    }

    /// Detect and recover every detached port on one node. Unreachable nodes
    /// and per-port failures are recorded in the result, never raised.
    pub async fn recover_node(&self, node: &ManagedNode) -> Result<NodeRecovery> {
        let mut recovery = NodeRecovery {
            hostname: node.hostname.clone(),
            ..NodeRecovery::default()
        };

        let detached = match self.find_detached(node).await {
            Ok(detached) => detached,
            Err(SyncError::RemoteUnavailable { target, source }) => {
                warn!("{} unreachable, skipping recovery: {:#}", target, source);
                recovery.unreachable = true;
                return Ok(recovery);
            }
            Err(e) => return Err(e),
        };

        for port in detached {
            match self.recover(node, &port).await {
                Ok(true) => recovery.recovered.push(vport_name(&port.id)),
                Ok(false) => recovery.already_present.push(vport_name(&port.id)),
                Err(e) => {
                    warn!(
                        "Recovering port {} on {} failed: {}",
                        port.id, node.hostname, e
                    );
                    recovery.failed.push((port.id.clone(), e.to_string()));
                }
            }
        }

        Ok(recovery)
    }

    /// Recovery sweep across nodes. One node's failure never fails the batch.
    pub async fn recover_all(&self, nodes: &[ManagedNode]) -> Result<RecoveryReport> {
        let mut report = RecoveryReport::default();
        for node in nodes {
            report.nodes.push(self.recover_node(node).await?);
        }
        Ok(report)
    }
}

/// Build the binding metadata from the port payload. Every field is
/// mandatory: an interface created without them is silently mis-bound by
/// higher layers rather than rejected.
fn interface_metadata(port: &ResourceRecord) -> Result<InterfaceMetadata> {
    let mac = port
        .mac_address()
        .ok_or_else(|| SyncError::Config(format!("port {} has no mac_address", port.id)))?;
    let vm_id = port
        .device_id()
        .ok_or_else(|| SyncError::Config(format!("port {} has no device_id", port.id)))?;
    let status = port.status().unwrap_or("DOWN");

    Ok(InterfaceMetadata {
        attached_mac: mac.to_string(),
        iface_id: port.id.clone(),
        iface_status: status.to_string(),
        vm_id: vm_id.to_string(),
    })
}

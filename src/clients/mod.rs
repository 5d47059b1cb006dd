//! Collaborator interfaces consumed by the engine.
//!
//! Everything remote lives behind one of these traits: the orchestrator's
//! resource listings, the controller's flow-rule and node admin services, and
//! the per-node virtual-switch endpoints. Implementations are injected
//! explicitly into constructors; nothing is resolved from ambient global
//! state. Calls are async, remote, and individually failable.
//!
//! REST-backed implementations for the CLI live in [`http`].

pub mod http;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::node::{ManagedNode, NodeState, NodeType};
use crate::resource::{ResourceKind, ResourceRecord};

pub use http::{HttpControllerAdmin, HttpOrchestrator};

/// Point-in-time resource listings from the external orchestrator.
#[async_trait]
pub trait OrchestratorClient: Send + Sync {
    /// Fetch the authoritative records of one kind. The result is transient,
    /// regenerated on every reconciliation pass, never persisted.
    async fn list_resources(&self, kind: ResourceKind) -> Result<Vec<ResourceRecord>>;
}

/// Flow-rule administration on the controller.
#[async_trait]
pub trait FlowRuleAdmin: Send + Sync {
    /// Whether `app_id` is a registered application.
    async fn is_registered(&self, app_id: &str) -> Result<bool>;

    /// Bulk-remove every rule owned by `app_id`. Idempotent: removing
    /// already-removed rules is a no-op.
    async fn remove_rules_by_app(&self, app_id: &str) -> Result<()>;

    /// Count of rule entries still installed for `app_id` across all
    /// switches. Eventually consistent.
    async fn count_rules_by_app(&self, app_id: &str) -> Result<u64>;
}

/// Node inventory and lifecycle persistence.
#[async_trait]
pub trait NodeAdmin: Send + Sync {
    async fn list_nodes(&self, node_type: Option<NodeType>) -> Result<Vec<ManagedNode>>;

    async fn get_node(&self, hostname: &str) -> Result<Option<ManagedNode>>;

    /// Persist a node state change. Transition validity is the caller's
    /// concern ([`crate::driver::NodeStateDriver`] is the single entry
    /// point).
    async fn update_node_state(&self, hostname: &str, state: NodeState) -> Result<()>;
}

/// A live interface observed on a node's integration bridge.
///
/// Read from port annotations, not from the switch database directly, so the
/// engine stays abstraction-agnostic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortAnnotation {
    /// Human-readable port name on the bridge.
    pub name: String,
    /// Orchestrator port ID the interface claims to belong to, if annotated.
    pub interface_id: Option<String>,
    pub mac: Option<String>,
}

/// Read-only view of a node's live switch ports.
#[async_trait]
pub trait SwitchPortInspector: Send + Sync {
    async fn list_ports(&self, node: &ManagedNode) -> Result<Vec<PortAnnotation>>;
}

/// External metadata attached to a recovered interface.
///
/// This is what identifies the interface to higher layers; a missing or wrong
/// field causes silent mis-binding rather than an error, so every field is
/// mandatory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceMetadata {
    pub attached_mac: String,
    /// Orchestrator port ID, used as the interface identifier.
    pub iface_id: String,
    /// Administrative status of the port (`ACTIVE` / `DOWN`).
    pub iface_status: String,
    /// Owning VM ID.
    pub vm_id: String,
}

/// Interface creation on a node's switch-management endpoint.
#[async_trait]
pub trait SwitchAdminClient: Send + Sync {
    async fn create_interface(
        &self,
        node: &ManagedNode,
        name: &str,
        metadata: &InterfaceMetadata,
    ) -> Result<()>;
}

/// Distributed component configuration. Each component independently fetches
/// its own local copy, so reads may lag writes across a cluster.
#[async_trait]
pub trait ComponentConfigAdmin: Send + Sync {
    async fn set_property(&self, component: &str, key: &str, value: &str) -> Result<()>;

    async fn get_property(&self, component: &str, key: &str) -> Result<Option<String>>;
}

/// The full collaborator set, bundled for engine construction.
#[derive(Clone)]
pub struct Collaborators {
    pub orchestrator: Arc<dyn OrchestratorClient>,
    pub flow_rules: Arc<dyn FlowRuleAdmin>,
    pub nodes: Arc<dyn NodeAdmin>,
    pub port_inspector: Arc<dyn SwitchPortInspector>,
    pub switch_admin: Arc<dyn SwitchAdminClient>,
    pub config_admin: Arc<dyn ComponentConfigAdmin>,
}

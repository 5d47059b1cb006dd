//! Tenant network resource model.
//!
//! Resources are opaque to the engine: only identity and existence matter for
//! diffing, the full JSON payload matters for upserts. The few payload fields
//! the engine does read (port bindings, device ownership) are exposed as
//! accessors here so the rest of the code never touches raw JSON keys.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Device owner marking a port as a router interface.
pub const ROUTER_INTERFACE_OWNER: &str = "network:router_interface";

/// Device owner prefix for ports bound to a live VM.
pub const COMPUTE_OWNER_PREFIX: &str = "compute:";

/// Resource kinds managed by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Network,
    Subnet,
    Port,
    Router,
    RouterInterface,
    FloatingIp,
    SecurityGroup,
}

impl ResourceKind {
    /// Kinds fetched from the orchestrator and diffed by ID.
    ///
    /// `RouterInterface` is absent on purpose: the orchestrator does not
    /// expose router interfaces as a first-class listable resource, so they
    /// are derived from cached ports and routers instead of diffed.
    pub const SYNCED: [ResourceKind; 6] = [
        ResourceKind::Network,
        ResourceKind::Subnet,
        ResourceKind::Port,
        ResourceKind::Router,
        ResourceKind::FloatingIp,
        ResourceKind::SecurityGroup,
    ];

    /// Every kind held in the cache.
    pub const ALL: [ResourceKind; 7] = [
        ResourceKind::Network,
        ResourceKind::Subnet,
        ResourceKind::Port,
        ResourceKind::Router,
        ResourceKind::RouterInterface,
        ResourceKind::FloatingIp,
        ResourceKind::SecurityGroup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Network => "network",
            ResourceKind::Subnet => "subnet",
            ResourceKind::Port => "port",
            ResourceKind::Router => "router",
            ResourceKind::RouterInterface => "router_interface",
            ResourceKind::FloatingIp => "floating_ip",
            ResourceKind::SecurityGroup => "security_group",
        }
    }

    /// REST collection name used by the orchestrator client.
    pub fn collection(&self) -> &'static str {
        match self {
            ResourceKind::Network => "networks",
            ResourceKind::Subnet => "subnets",
            ResourceKind::Port => "ports",
            ResourceKind::Router => "routers",
            ResourceKind::RouterInterface => "router-interfaces",
            ResourceKind::FloatingIp => "floatingips",
            ResourceKind::SecurityGroup => "security-groups",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An opaque network resource with a stable string identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub kind: ResourceKind,
    pub id: String,
    pub payload: Value,
}

impl ResourceRecord {
    pub fn new(kind: ResourceKind, id: impl Into<String>, payload: Value) -> Self {
        Self {
            kind,
            id: id.into(),
            payload,
        }
    }

    /// Build a record from a raw orchestrator payload, taking the identity
    /// from its `id` field. Returns `None` when the payload carries no usable
    /// ID (such records are reported as per-item failures, not dropped
    /// silently).
    pub fn from_payload(kind: ResourceKind, payload: Value) -> Option<Self> {
        let id = payload.get("id")?.as_str()?.trim();
        if id.is_empty() {
            return None;
        }
        Some(Self {
            kind,
            id: id.to_string(),
            payload,
        })
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    /// `device_owner` of a port payload.
    pub fn device_owner(&self) -> Option<&str> {
        self.str_field("device_owner")
    }

    /// `device_id` of a port payload (router ID or VM ID depending on owner).
    pub fn device_id(&self) -> Option<&str> {
        self.str_field("device_id")
    }

    pub fn mac_address(&self) -> Option<&str> {
        self.str_field("mac_address")
    }

    pub fn status(&self) -> Option<&str> {
        self.str_field("status")
    }

    /// Hostname the port is bound to, if any.
    pub fn host_binding(&self) -> Option<&str> {
        self.str_field("binding:host_id")
    }

    /// True for ports whose device owner marks them as a router interface.
    pub fn is_router_interface(&self) -> bool {
        self.device_owner() == Some(ROUTER_INTERFACE_OWNER)
    }

    /// True for ports owned by a live VM.
    pub fn is_vm_port(&self) -> bool {
        self.device_owner()
            .is_some_and(|o| o.starts_with(COMPUTE_OWNER_PREFIX))
    }
}

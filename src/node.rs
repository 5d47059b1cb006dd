//! Managed dataplane nodes and their lifecycle state machine.

use serde::{Deserialize, Serialize};

/// Node lifecycle state.
///
/// `Complete` is the state at which flow-rule handlers consider the node
/// ready and correctly programmed; `Init` unconditionally re-triggers every
/// registered setup handler. Forcing a node from `Complete` back to `Init` is
/// the sole mechanism by which configuration changes cause dataplane rules to
/// be recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeState {
    Init,
    DeviceCreated,
    PortComplete,
    Complete,
    Incomplete,
}

impl NodeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeState::Init => "INIT",
            NodeState::DeviceCreated => "DEVICE_CREATED",
            NodeState::PortComplete => "PORT_COMPLETE",
            NodeState::Complete => "COMPLETE",
            NodeState::Incomplete => "INCOMPLETE",
        }
    }

    /// Closed transition table. The only path back to `Init` is from
    /// `Complete` (forced resync) or `Incomplete` (setup retry); everything
    /// else moves forward through the setup chain or fails sideways into
    /// `Incomplete`.
    pub fn can_transition(self, to: NodeState) -> bool {
        use NodeState::*;
        matches!(
            (self, to),
            (Init, DeviceCreated)
                | (DeviceCreated, PortComplete)
                | (PortComplete, Complete)
                | (Init, Incomplete)
                | (DeviceCreated, Incomplete)
                | (PortComplete, Incomplete)
                | (Complete, Init)
                | (Incomplete, Init)
        )
    }
}

impl std::str::FromStr for NodeState {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INIT" => Ok(NodeState::Init),
            "DEVICE_CREATED" => Ok(NodeState::DeviceCreated),
            "PORT_COMPLETE" => Ok(NodeState::PortComplete),
            "COMPLETE" => Ok(NodeState::Complete),
            "INCOMPLETE" => Ok(NodeState::Incomplete),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role of a managed node in the dataplane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    Compute,
    Gateway,
    Controller,
}

impl NodeType {
    /// Node types that carry an integration bridge and receive flow rules.
    pub const DATAPLANE: [NodeType; 2] = [NodeType::Compute, NodeType::Gateway];
}

/// Optional administration credentials for a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshAuth {
    pub username: String,
    pub private_key_path: Option<String>,
}

/// A physical or virtual host participating in the dataplane.
///
/// Identity is the hostname. Nodes are discovered via configuration and never
/// deleted by this engine while referenced by live resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedNode {
    pub hostname: String,
    pub node_type: NodeType,
    pub state: NodeState,
    /// Device identifier of the node's integration bridge.
    pub integration_bridge: String,
    /// Switch-management endpoint address.
    pub mgmt_ip: Option<String>,
    pub ssh_auth: Option<SshAuth>,
}

impl ManagedNode {
    pub fn is_dataplane(&self) -> bool {
        NodeType::DATAPLANE.contains(&self.node_type)
    }
}

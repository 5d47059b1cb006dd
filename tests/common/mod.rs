//! Shared fakes for vnet-sync integration tests.
//!
//! Every collaborator trait gets an in-memory implementation with enough
//! scripting hooks (lagging reads, failing kinds, unreachable hosts, node
//! auto-convergence) to drive the engine through its failure paths.

// Each test binary uses its own subset of the harness.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::json;

use vnet_sync::clients::{
    Collaborators, ComponentConfigAdmin, FlowRuleAdmin, InterfaceMetadata, NodeAdmin,
    OrchestratorClient, PortAnnotation, SwitchAdminClient, SwitchPortInspector,
};
use vnet_sync::node::{ManagedNode, NodeState, NodeType};
use vnet_sync::resource::{ResourceKind, ResourceRecord};
use vnet_sync::{EngineConfig, SyncEngine};

// ---------------------------------------------------------------------------
// Record builders
// ---------------------------------------------------------------------------

pub fn network(id: &str, name: &str) -> ResourceRecord {
    ResourceRecord::new(ResourceKind::Network, id, json!({"id": id, "name": name}))
}

pub fn vm_port(id: &str, host: &str, vm: &str) -> ResourceRecord {
    ResourceRecord::new(
        ResourceKind::Port,
        id,
        json!({
            "id": id,
            "device_owner": "compute:nova",
            "device_id": vm,
            "mac_address": format!("fa:16:3e:00:00:{:02x}", id.len()),
            "status": "ACTIVE",
            "binding:host_id": host,
        }),
    )
}

pub fn router(id: &str) -> ResourceRecord {
    ResourceRecord::new(ResourceKind::Router, id, json!({"id": id}))
}

pub fn router_iface_port(id: &str, router_id: &str) -> ResourceRecord {
    ResourceRecord::new(
        ResourceKind::Port,
        id,
        json!({
            "id": id,
            "device_owner": "network:router_interface",
            "device_id": router_id,
        }),
    )
}

pub fn compute_node(hostname: &str, state: NodeState) -> ManagedNode {
    ManagedNode {
        hostname: hostname.to_string(),
        node_type: NodeType::Compute,
        state,
        integration_bridge: "br-int".to_string(),
        mgmt_ip: Some("10.0.0.10".to_string()),
        ssh_auth: None,
    }
}

// ---------------------------------------------------------------------------
// Fake orchestrator
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeOrchestrator {
    resources: Mutex<HashMap<ResourceKind, Vec<ResourceRecord>>>,
    failing_kinds: Mutex<HashSet<ResourceKind>>,
}

impl FakeOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_resources(&self, kind: ResourceKind, records: Vec<ResourceRecord>) {
        self.resources.lock().unwrap().insert(kind, records);
    }

    pub fn fail_kind(&self, kind: ResourceKind) {
        self.failing_kinds.lock().unwrap().insert(kind);
    }
}

#[async_trait]
impl OrchestratorClient for FakeOrchestrator {
    async fn list_resources(&self, kind: ResourceKind) -> Result<Vec<ResourceRecord>> {
        if self.failing_kinds.lock().unwrap().contains(&kind) {
            return Err(anyhow!("orchestrator listing of {kind} unavailable"));
        }
        Ok(self
            .resources
            .lock()
            .unwrap()
            .get(&kind)
            .cloned()
            .unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Fake flow-rule admin
// ---------------------------------------------------------------------------

pub struct FakeFlowRules {
    registered: Mutex<HashSet<String>>,
    /// Counts returned by successive count polls; the last value repeats once
    /// the script is exhausted.
    count_script: Mutex<VecDeque<u64>>,
    last_count: Mutex<u64>,
    pub removals: Mutex<u32>,
}

impl FakeFlowRules {
    pub fn new(app_id: &str, count_script: &[u64]) -> Self {
        Self {
            registered: Mutex::new([app_id.to_string()].into_iter().collect()),
            count_script: Mutex::new(count_script.iter().copied().collect()),
            last_count: Mutex::new(count_script.last().copied().unwrap_or(0)),
            removals: Mutex::new(0),
        }
    }

    pub fn removal_count(&self) -> u32 {
        *self.removals.lock().unwrap()
    }
}

#[async_trait]
impl FlowRuleAdmin for FakeFlowRules {
    async fn is_registered(&self, app_id: &str) -> Result<bool> {
        Ok(self.registered.lock().unwrap().contains(app_id))
    }

    async fn remove_rules_by_app(&self, _app_id: &str) -> Result<()> {
        *self.removals.lock().unwrap() += 1;
        Ok(())
    }

    async fn count_rules_by_app(&self, _app_id: &str) -> Result<u64> {
        match self.count_script.lock().unwrap().pop_front() {
            Some(count) => Ok(count),
            None => Ok(*self.last_count.lock().unwrap()),
        }
    }
}

// ---------------------------------------------------------------------------
// Fake node admin
// ---------------------------------------------------------------------------

/// Node inventory that can auto-walk a node back to COMPLETE a fixed number
/// of polls after it was forced to INIT.
pub struct FakeNodeAdmin {
    nodes: Mutex<HashMap<String, ManagedNode>>,
    /// hostname -> remaining get_node polls before flipping to COMPLETE.
    converge_after: Mutex<HashMap<String, u32>>,
    pub state_updates: Mutex<Vec<(String, NodeState)>>,
}

impl FakeNodeAdmin {
    pub fn new(nodes: Vec<ManagedNode>) -> Self {
        Self {
            nodes: Mutex::new(nodes.into_iter().map(|n| (n.hostname.clone(), n)).collect()),
            converge_after: Mutex::new(HashMap::new()),
            state_updates: Mutex::new(Vec::new()),
        }
    }

    /// After being forced to INIT, `hostname` reports COMPLETE again once it
    /// has been polled `polls` times.
    pub fn converge_after(&self, hostname: &str, polls: u32) {
        self.converge_after
            .lock()
            .unwrap()
            .insert(hostname.to_string(), polls);
    }

    /// Panics when the node is absent; tests know their inventory.
    pub fn get_node_sync(&self, hostname: &str) -> ManagedNode {
        self.nodes.lock().unwrap().get(hostname).unwrap().clone()
    }

    pub fn node_state(&self, hostname: &str) -> Option<NodeState> {
        self.nodes.lock().unwrap().get(hostname).map(|n| n.state)
    }

    pub fn updates(&self) -> Vec<(String, NodeState)> {
        self.state_updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl NodeAdmin for FakeNodeAdmin {
    async fn list_nodes(&self, node_type: Option<NodeType>) -> Result<Vec<ManagedNode>> {
        let nodes = self.nodes.lock().unwrap();
        Ok(nodes
            .values()
            .filter(|n| node_type.is_none_or(|t| n.node_type == t))
            .cloned()
            .collect())
    }

    async fn get_node(&self, hostname: &str) -> Result<Option<ManagedNode>> {
        let mut nodes = self.nodes.lock().unwrap();
        let Some(node) = nodes.get_mut(hostname) else {
            return Ok(None);
        };

        if node.state == NodeState::Init {
            let mut converge = self.converge_after.lock().unwrap();
            if let Some(remaining) = converge.get_mut(hostname) {
                if *remaining == 0 {
                    node.state = NodeState::Complete;
                } else {
                    *remaining -= 1;
                }
            }
        }
        Ok(Some(node.clone()))
    }

    async fn update_node_state(&self, hostname: &str, state: NodeState) -> Result<()> {
        let mut nodes = self.nodes.lock().unwrap();
        let node = nodes
            .get_mut(hostname)
            .ok_or_else(|| anyhow!("node {hostname} not found"))?;
        node.state = state;
        self.state_updates
            .lock()
            .unwrap()
            .push((hostname.to_string(), state));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fake switch (inspector + admin)
// ---------------------------------------------------------------------------

/// Live bridge ports per hostname. Created interfaces become visible to the
/// inspector immediately, so idempotence checks observe them.
#[derive(Default)]
pub struct FakeSwitch {
    ports: Mutex<HashMap<String, Vec<PortAnnotation>>>,
    unreachable: Mutex<HashSet<String>>,
    pub created: Mutex<Vec<(String, String, InterfaceMetadata)>>,
}

impl FakeSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_port(&self, hostname: &str, name: &str) {
        self.ports
            .lock()
            .unwrap()
            .entry(hostname.to_string())
            .or_default()
            .push(PortAnnotation {
                name: name.to_string(),
                interface_id: None,
                mac: None,
            });
    }

    pub fn mark_unreachable(&self, hostname: &str) {
        self.unreachable.lock().unwrap().insert(hostname.to_string());
    }

    pub fn created_interfaces(&self) -> Vec<(String, String, InterfaceMetadata)> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl SwitchPortInspector for FakeSwitch {
    async fn list_ports(&self, node: &ManagedNode) -> Result<Vec<PortAnnotation>> {
        if self.unreachable.lock().unwrap().contains(&node.hostname) {
            return Err(anyhow!("no route to {}", node.hostname));
        }
        Ok(self
            .ports
            .lock()
            .unwrap()
            .get(&node.hostname)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl SwitchAdminClient for FakeSwitch {
    async fn create_interface(
        &self,
        node: &ManagedNode,
        name: &str,
        metadata: &InterfaceMetadata,
    ) -> Result<()> {
        if self.unreachable.lock().unwrap().contains(&node.hostname) {
            return Err(anyhow!("no route to {}", node.hostname));
        }
        self.created.lock().unwrap().push((
            node.hostname.clone(),
            name.to_string(),
            metadata.clone(),
        ));
        self.ports
            .lock()
            .unwrap()
            .entry(node.hostname.clone())
            .or_default()
            .push(PortAnnotation {
                name: name.to_string(),
                interface_id: Some(metadata.iface_id.clone()),
                mac: Some(metadata.attached_mac.clone()),
            });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fake component config
// ---------------------------------------------------------------------------

/// Distributed config whose reads lag writes by a per-component poll count.
#[derive(Default)]
pub struct FakeConfigAdmin {
    values: Mutex<HashMap<(String, String), String>>,
    lag: Mutex<HashMap<String, u32>>,
}

impl FakeConfigAdmin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_lag(&self, component: &str, polls: u32) {
        self.lag.lock().unwrap().insert(component.to_string(), polls);
    }
}

#[async_trait]
impl ComponentConfigAdmin for FakeConfigAdmin {
    async fn set_property(&self, component: &str, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .unwrap()
            .insert((component.to_string(), key.to_string()), value.to_string());
        Ok(())
    }

    async fn get_property(&self, component: &str, key: &str) -> Result<Option<String>> {
        let mut lag = self.lag.lock().unwrap();
        if let Some(remaining) = lag.get_mut(component) {
            if *remaining > 0 {
                *remaining -= 1;
                return Ok(None);
            }
        }
        Ok(self
            .values
            .lock()
            .unwrap()
            .get(&(component.to_string(), key.to_string()))
            .cloned())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// The full fake collaborator set plus the engine built on top of it.
pub struct Harness {
    pub orchestrator: Arc<FakeOrchestrator>,
    pub flow_rules: Arc<FakeFlowRules>,
    pub nodes: Arc<FakeNodeAdmin>,
    pub switch: Arc<FakeSwitch>,
    pub config_admin: Arc<FakeConfigAdmin>,
    pub engine: SyncEngine,
}

impl Harness {
    pub fn new(cfg: EngineConfig, nodes: Vec<ManagedNode>, count_script: &[u64]) -> Self {
        let registered = cfg.app_id.clone();
        Self::with_registered_app_inner(cfg, &registered, nodes, count_script)
    }

    /// Like `new`, but the flow-rule service knows `registered_app` instead
    /// of the engine's configured application.
    pub fn with_registered_app(
        cfg: EngineConfig,
        registered_app: &str,
        count_script: &[u64],
    ) -> Self {
        Self::with_registered_app_inner(cfg, registered_app, vec![], count_script)
    }

    fn with_registered_app_inner(
        cfg: EngineConfig,
        registered_app: &str,
        nodes: Vec<ManagedNode>,
        count_script: &[u64],
    ) -> Self {
        let orchestrator = Arc::new(FakeOrchestrator::new());
        let flow_rules = Arc::new(FakeFlowRules::new(registered_app, count_script));
        let node_admin = Arc::new(FakeNodeAdmin::new(nodes));
        let switch = Arc::new(FakeSwitch::new());
        let config_admin = Arc::new(FakeConfigAdmin::new());

        let collaborators = Collaborators {
            orchestrator: Arc::clone(&orchestrator) as _,
            flow_rules: Arc::clone(&flow_rules) as _,
            nodes: Arc::clone(&node_admin) as _,
            port_inspector: Arc::clone(&switch) as _,
            switch_admin: Arc::clone(&switch) as _,
            config_admin: Arc::clone(&config_admin) as _,
        };

        Self {
            orchestrator,
            flow_rules,
            nodes: node_admin,
            switch,
            config_admin,
            engine: SyncEngine::new(cfg, collaborators),
        }
    }

    /// Config with short intervals suited to paused-clock tests.
    pub fn fast_config() -> EngineConfig {
        EngineConfig {
            rule_poll_interval_ms: 2_000,
            rule_purge_timeout_ms: 10_000,
            node_poll_interval_ms: 100,
            node_resync_timeout_ms: 2_000,
            resync_throttle_ms: 50,
            property_poll_interval_ms: 100,
            property_timeout_ms: 2_000,
            ..EngineConfig::default()
        }
    }
}

//! Port recovery: detached interface detection and idempotent recreation on
//! the integration bridge.

mod common;

use common::{Harness, compute_node, router_iface_port, vm_port};
use vnet_sync::node::NodeState;
use vnet_sync::resource::ResourceKind;
use vnet_sync::{SyncError, vport_name};

const PORT_A: &str = "4e6dd9cf-87b1-43b2-b13b-29e5a648ad35";
const PORT_B: &str = "9d7bfb47-1a17-43e8-9419-b3b9d6b721ae";

#[tokio::test]
async fn test_recovers_detached_ports_with_binding_metadata() {
    let h = Harness::new(
        Harness::fast_config(),
        vec![compute_node("compute-01", NodeState::Complete)],
        &[0],
    );
    h.orchestrator.set_resources(
        ResourceKind::Port,
        vec![
            vm_port(PORT_A, "compute-01", "vm-1"),
            vm_port(PORT_B, "compute-01", "vm-2"),
        ],
    );

    let report = h.engine.recover_ports(None).await.unwrap();

    assert_eq!(report.total_recovered(), 2);
    let created = h.switch.created_interfaces();
    let (host, name, meta) = created
        .iter()
        .find(|(_, _, m)| m.iface_id == PORT_A)
        .unwrap();
    assert_eq!(host, "compute-01");
    assert_eq!(name, "tap4e6dd9cf-87");
    assert_eq!(meta.vm_id, "vm-1");
    assert_eq!(meta.iface_status, "ACTIVE");
    assert!(!meta.attached_mac.is_empty());
}

#[tokio::test]
async fn test_present_port_is_left_alone() {
    let h = Harness::new(
        Harness::fast_config(),
        vec![compute_node("compute-01", NodeState::Complete)],
        &[0],
    );
    h.orchestrator.set_resources(
        ResourceKind::Port,
        vec![
            vm_port(PORT_A, "compute-01", "vm-1"),
            vm_port(PORT_B, "compute-01", "vm-2"),
        ],
    );
    h.switch.add_port("compute-01", &vport_name(PORT_A));

    let report = h.engine.recover_ports(None).await.unwrap();

    assert_eq!(report.total_recovered(), 1);
    let created = h.switch.created_interfaces();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].2.iface_id, PORT_B);
}

#[tokio::test]
async fn test_double_recovery_creates_exactly_one_interface() {
    let h = Harness::new(
        Harness::fast_config(),
        vec![compute_node("compute-01", NodeState::Complete)],
        &[0],
    );
    h.orchestrator
        .set_resources(ResourceKind::Port, vec![vm_port(PORT_A, "compute-01", "vm-1")]);

    let first = h.engine.recover_ports(None).await.unwrap();
    let second = h.engine.recover_ports(None).await.unwrap();

    assert_eq!(first.total_recovered(), 1);
    assert_eq!(second.total_recovered(), 0);
    assert_eq!(h.switch.created_interfaces().len(), 1);
}

#[tokio::test]
async fn test_ports_bound_elsewhere_are_ignored() {
    let h = Harness::new(
        Harness::fast_config(),
        vec![compute_node("compute-01", NodeState::Complete)],
        &[0],
    );
    h.orchestrator.set_resources(
        ResourceKind::Port,
        vec![
            vm_port(PORT_A, "compute-02", "vm-1"),
            router_iface_port(PORT_B, "router-1"),
        ],
    );

    let report = h.engine.recover_ports(None).await.unwrap();

    // Neither a port bound to another host nor a router interface belongs on
    // this bridge.
    assert_eq!(report.total_recovered(), 0);
    assert!(h.switch.created_interfaces().is_empty());
}

#[tokio::test]
async fn test_unreachable_node_does_not_fail_the_sweep() {
    let h = Harness::new(
        Harness::fast_config(),
        vec![
            compute_node("compute-01", NodeState::Complete),
            compute_node("compute-02", NodeState::Complete),
        ],
        &[0],
    );
    h.orchestrator.set_resources(
        ResourceKind::Port,
        vec![
            vm_port(PORT_A, "compute-01", "vm-1"),
            vm_port(PORT_B, "compute-02", "vm-2"),
        ],
    );
    h.switch.mark_unreachable("compute-01");

    let report = h.engine.recover_ports(None).await.unwrap();

    let down = report
        .nodes
        .iter()
        .find(|n| n.hostname == "compute-01")
        .unwrap();
    assert!(down.unreachable);
    assert!(down.recovered.is_empty());

    let up = report
        .nodes
        .iter()
        .find(|n| n.hostname == "compute-02")
        .unwrap();
    assert_eq!(up.recovered, vec![vport_name(PORT_B)]);
}

#[tokio::test]
async fn test_recover_named_node() {
    let h = Harness::new(
        Harness::fast_config(),
        vec![
            compute_node("compute-01", NodeState::Complete),
            compute_node("compute-02", NodeState::Complete),
        ],
        &[0],
    );
    h.orchestrator.set_resources(
        ResourceKind::Port,
        vec![
            vm_port(PORT_A, "compute-01", "vm-1"),
            vm_port(PORT_B, "compute-02", "vm-2"),
        ],
    );

    let report = h.engine.recover_ports(Some("compute-02")).await.unwrap();

    assert_eq!(report.nodes.len(), 1);
    assert_eq!(report.nodes[0].hostname, "compute-02");
    assert_eq!(report.total_recovered(), 1);
}

#[tokio::test]
async fn test_recover_unknown_node_is_config_error() {
    let h = Harness::new(Harness::fast_config(), vec![], &[0]);

    let err = h.engine.recover_ports(Some("ghost")).await.unwrap_err();
    assert!(matches!(err, SyncError::Config(_)));
}

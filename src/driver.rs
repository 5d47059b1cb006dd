//! Node state machine driver.
//!
//! The single mutation entry point for node lifecycle state, plus the bounded
//! wait that observes a node returning to `COMPLETE`. Forcing a `COMPLETE`
//! node back to `INIT` is how configuration changes reach the dataplane:
//! setup handlers listen on the INIT-to-COMPLETE transition, not on the
//! configuration write itself.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::clients::NodeAdmin;
use crate::error::{Result, SyncError};
use crate::events::{EventBus, NodeEvent};
use crate::node::{ManagedNode, NodeState};
use crate::shutdown::Shutdown;

pub struct NodeStateDriver {
    nodes: Arc<dyn NodeAdmin>,
    bus: EventBus,
    poll_interval: Duration,
    shutdown: Shutdown,
}

impl NodeStateDriver {
    pub fn new(
        nodes: Arc<dyn NodeAdmin>,
        bus: EventBus,
        poll_interval: Duration,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            nodes,
            bus,
            poll_interval,
            shutdown,
        }
    }

    /// Apply a state change, enforcing the transition table and persisting
    /// the result. All node state mutations go through here.
    pub async fn transition(&self, node: &ManagedNode, to: NodeState) -> Result<()> {
        if !node.state.can_transition(to) {
            return Err(SyncError::InvalidTransition {
                from: node.state,
                to,
            });
        }

        self.nodes
            .update_node_state(&node.hostname, to)
            .await
            .map_err(|e| SyncError::RemoteUnavailable {
                target: format!("node admin for {}", node.hostname),
                source: e,
            })?;

        info!("Node {} transitioned {} -> {}", node.hostname, node.state, to);
        self.bus.publish(NodeEvent::StateChanged {
            hostname: node.hostname.clone(),
            from: node.state,
            to,
        });
        if to == NodeState::Init {
            self.bus.publish(NodeEvent::ResyncRequested {
                hostname: node.hostname.clone(),
            });
        }
        Ok(())
    }

    /// Force a node back through its setup state machine. Idempotent: a node
    /// already in `INIT` is left alone (no write, no duplicate event).
    /// Returns `true` if a transition was actually performed.
    pub async fn force_resync(&self, node: &ManagedNode) -> Result<bool> {
        match node.state {
            NodeState::Init => {
                debug!("Node {} already in INIT, resync is a no-op", node.hostname);
                Ok(false)
            }
            NodeState::Complete | NodeState::Incomplete => {
                self.transition(node, NodeState::Init).await?;
                Ok(true)
            }
            from => Err(SyncError::InvalidTransition {
                from,
                to: NodeState::Init,
            }),
        }
    }

    /// Poll until the node reports `COMPLETE`, up to `timeout`. Publishes
    /// `NodeReady` on arrival. Nodes that miss the window get a
    /// `ConvergenceTimeout`; they are reported, not retried indefinitely.
    pub async fn await_complete(&self, hostname: &str, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut shutdown = self.shutdown.clone();

        loop {
            if shutdown.is_shutdown() {
                return Err(SyncError::Cancelled);
            }

            match self.nodes.get_node(hostname).await {
                Ok(Some(node)) if node.state == NodeState::Complete => {
                    info!("Node {} reached COMPLETE", hostname);
                    self.bus.publish(NodeEvent::NodeReady {
                        hostname: hostname.to_string(),
                    });
                    return Ok(());
                }
                Ok(Some(node)) => {
                    debug!("Node {} still in {}", hostname, node.state);
                }
                Ok(None) => {
                    return Err(SyncError::Config(format!("node {hostname} not found")));
                }
                Err(e) => {
                    // Transient: keep polling until the deadline decides.
                    warn!("Polling node {} failed: {:#}", hostname, e);
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(SyncError::ConvergenceTimeout {
                    what: format!("node {hostname} COMPLETE"),
                    waited: timeout,
                });
            }
            if !shutdown.sleep(remaining.min(self.poll_interval)).await {
                return Err(SyncError::Cancelled);
            }
        }
    }
}

//! Node lifecycle event bus.
//!
//! Rule-installation handlers subscribe to `NodeReady` rather than to
//! configuration-change events: a config change alone does nothing until a
//! forced resync walks the node back through its setup state machine and this
//! event fires again. That coupling is deliberate and must stay explicit.

use tokio::sync::broadcast;

use crate::node::NodeState;

/// Events published when managed nodes change lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEvent {
    /// A node arrived at `COMPLETE`: setup handlers have run and the node is
    /// correctly programmed.
    NodeReady { hostname: String },
    /// A node was forced back to `INIT` so its setup handlers re-fire.
    ResyncRequested { hostname: String },
    /// Any other observed state change.
    StateChanged {
        hostname: String,
        from: NodeState,
        to: NodeState,
    },
}

impl NodeEvent {
    pub fn hostname(&self) -> &str {
        match self {
            NodeEvent::NodeReady { hostname }
            | NodeEvent::ResyncRequested { hostname }
            | NodeEvent::StateChanged { hostname, .. } => hostname,
        }
    }
}

/// Broadcast bus for node events. Cheap to clone; publishing with no
/// subscribers is fine.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<NodeEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: NodeEvent) {
        // Err here only means nobody is listening right now.
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NodeEvent> {
        self.tx.subscribe()
    }
}

//! vnet-sync: control-plane consistency engine for SDN network
//! virtualization.
//!
//! Keeps three representations of tenant network state aligned: the
//! controller's cached resource model, the authoritative state held by the
//! external orchestrator, and the dataplane realized on compute and gateway
//! nodes. The engine detects drift between cached and authoritative resource
//! sets, applies idempotent create/update/delete against the cache, forces
//! nodes through their setup state machine to resynchronize flow rules, and
//! recovers virtual-switch ports that dropped off a node's integration
//! bridge.

pub mod audit;
pub mod clients;
pub mod config;
pub mod convergence;
pub mod diff;
pub mod driver;
pub mod engine;
pub mod error;
pub mod events;
pub mod node;
pub mod ports;
pub mod reconciler;
pub mod resource;
pub mod rules;
pub mod shutdown;
pub mod store;

pub use clients::Collaborators;
pub use config::EngineConfig;
pub use diff::{DiffResult, diff_ids};
pub use engine::{ArpMode, SyncEngine};
pub use error::{Result, SyncError};
pub use events::{EventBus, NodeEvent};
pub use node::{ManagedNode, NodeState, NodeType};
pub use ports::{RecoveryReport, vport_name};
pub use reconciler::{ReconcileReport, ResourceReconciler};
pub use resource::{ResourceKind, ResourceRecord};
pub use rules::{ResyncReport, RuleSynchronizer};
pub use store::{CachedStore, UpsertOutcome};

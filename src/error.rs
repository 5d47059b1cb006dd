//! Error taxonomy for consistency operations.

use std::time::Duration;

use thiserror::Error;

use crate::node::NodeState;

/// Errors surfaced by the consistency engine.
///
/// Partial failures (one resource kind or one node failing while others
/// succeed) are not errors; they are accumulated in the per-operation report
/// structs. An `Err` from an engine operation means the operation as a whole
/// could not proceed or did not converge.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Invalid request or engine configuration: unregistered application ID,
    /// unknown node, malformed input. Fatal to the requested operation,
    /// reported immediately, never retried.
    #[error("configuration error: {0}")]
    Config(String),

    /// A polled condition (rule count, node state, property value) did not
    /// reach its desired value before the deadline. Non-fatal to the process;
    /// the caller may retry the whole operation.
    #[error("{what} did not converge within {waited:?}")]
    ConvergenceTimeout { what: String, waited: Duration },

    /// A remote node or device could not be reached. Transient, scoped to a
    /// single unit of work.
    #[error("{target} unreachable: {source}")]
    RemoteUnavailable {
        target: String,
        #[source]
        source: anyhow::Error,
    },

    /// The orchestrator could not be queried.
    #[error("orchestrator error: {0}")]
    Orchestrator(#[source] anyhow::Error),

    /// A node state change was rejected by the transition table.
    #[error("invalid node state transition: {from:?} -> {to:?}")]
    InvalidTransition { from: NodeState, to: NodeState },

    /// The operation was cancelled via the shutdown channel.
    #[error("operation cancelled")]
    Cancelled,
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, SyncError>;

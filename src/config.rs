//! Engine configuration: poll intervals, deadlines, throttles, and the
//! component names touched by mode switches.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Tunables for the consistency engine. All durations are milliseconds in the
/// serialized form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Application ID owning the flow rules this engine purges and counts.
    pub app_id: String,

    /// Interval between rule-count polls during a purge.
    pub rule_poll_interval_ms: u64,
    /// Default deadline for a purge to converge to zero rules.
    pub rule_purge_timeout_ms: u64,

    /// Interval between node-state polls while waiting for `COMPLETE`.
    pub node_poll_interval_ms: u64,
    /// Deadline per node to return to `COMPLETE` after a forced resync.
    pub node_resync_timeout_ms: u64,
    /// Fixed delay between nodes during `resync_all`. A deliberate throttle
    /// on the control channel, not a correctness requirement.
    pub resync_throttle_ms: u64,

    /// Interval between property polls after a distributed config write.
    pub property_poll_interval_ms: u64,
    /// Deadline for all components to report the written value.
    pub property_timeout_ms: u64,

    /// Components whose `arp_mode` property drives dataplane programming.
    pub switching_components: Vec<String>,
    /// Components whose `use_stateful_snat` property drives gateway
    /// programming.
    pub routing_components: Vec<String>,

    /// Capacity of the node event broadcast bus.
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            app_id: "vnet-sync".to_string(),
            rule_poll_interval_ms: 2_000,
            rule_purge_timeout_ms: 10_000,
            node_poll_interval_ms: 1_000,
            node_resync_timeout_ms: 30_000,
            resync_throttle_ms: 3_000,
            property_poll_interval_ms: 500,
            property_timeout_ms: 30_000,
            switching_components: vec!["switching".to_string()],
            routing_components: vec!["routing".to_string()],
            event_capacity: 64,
        }
    }
}

impl EngineConfig {
    /// Load from a JSON file; absent keys fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn rule_poll_interval(&self) -> Duration {
        Duration::from_millis(self.rule_poll_interval_ms)
    }

    pub fn rule_purge_timeout(&self) -> Duration {
        Duration::from_millis(self.rule_purge_timeout_ms)
    }

    pub fn node_poll_interval(&self) -> Duration {
        Duration::from_millis(self.node_poll_interval_ms)
    }

    pub fn node_resync_timeout(&self) -> Duration {
        Duration::from_millis(self.node_resync_timeout_ms)
    }

    pub fn resync_throttle(&self) -> Duration {
        Duration::from_millis(self.resync_throttle_ms)
    }

    pub fn property_poll_interval(&self) -> Duration {
        Duration::from_millis(self.property_poll_interval_ms)
    }

    pub fn property_timeout(&self) -> Duration {
        Duration::from_millis(self.property_timeout_ms)
    }
}

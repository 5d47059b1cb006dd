//! Controller-side cache of tenant network resources.
//!
//! One map per resource kind behind a coarse per-kind lock. The cache is
//! owned exclusively by the controller, mutated only by the reconciler, and
//! never authoritative: on divergence the orchestrator snapshot always wins.

use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;

use crate::error::{Result, SyncError};
use crate::resource::{ResourceKind, ResourceRecord};

/// Outcome of an upsert against the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No record with this ID existed; inserted.
    Created,
    /// A record existed with a differing payload; replaced wholesale.
    Replaced,
    /// A record existed with an identical payload; nothing written.
    Unchanged,
}

/// Per-kind ID-to-record cache.
pub struct CachedStore {
    shards: HashMap<ResourceKind, RwLock<HashMap<String, ResourceRecord>>>,
}

impl CachedStore {
    pub fn new() -> Self {
        let shards = ResourceKind::ALL
            .into_iter()
            .map(|kind| (kind, RwLock::new(HashMap::new())))
            .collect();
        Self { shards }
    }

    fn shard(&self, kind: ResourceKind) -> &RwLock<HashMap<String, ResourceRecord>> {
        // Every kind is seeded in new(); the map is never mutated afterwards.
        &self.shards[&kind]
    }

    /// Insert or wholesale-replace a record. The authoritative record wins;
    /// there is no field-level merge.
    pub async fn upsert(&self, record: ResourceRecord) -> Result<UpsertOutcome> {
        if record.id.trim().is_empty() {
            return Err(SyncError::Config(format!(
                "{} record without an ID",
                record.kind
            )));
        }

        let mut shard = self.shard(record.kind).write().await;
        match shard.get(&record.id) {
            Some(existing) if existing.payload == record.payload => Ok(UpsertOutcome::Unchanged),
            Some(_) => {
                shard.insert(record.id.clone(), record);
                Ok(UpsertOutcome::Replaced)
            }
            None => {
                shard.insert(record.id.clone(), record);
                Ok(UpsertOutcome::Created)
            }
        }
    }

    /// Remove a record from the cache, returning it if present. Deletions are
    /// reported to the caller; dataplane teardown is never cascaded from
    /// here.
    pub async fn remove(&self, kind: ResourceKind, id: &str) -> Option<ResourceRecord> {
        self.shard(kind).write().await.remove(id)
    }

    pub async fn get(&self, kind: ResourceKind, id: &str) -> Option<ResourceRecord> {
        self.shard(kind).read().await.get(id).cloned()
    }

    /// All cached IDs of a kind.
    pub async fn ids(&self, kind: ResourceKind) -> HashSet<String> {
        self.shard(kind).read().await.keys().cloned().collect()
    }

    pub async fn list(&self, kind: ResourceKind) -> Vec<ResourceRecord> {
        self.shard(kind).read().await.values().cloned().collect()
    }

    pub async fn len(&self, kind: ResourceKind) -> usize {
        self.shard(kind).read().await.len()
    }
}

impl Default for CachedStore {
    fn default() -> Self {
        Self::new()
    }
}

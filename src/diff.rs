//! Set difference between cached and authoritative resource identifiers.

use std::collections::HashSet;

/// Result of diffing one resource kind.
///
/// No ordering guarantee on either set; callers that need stable output must
/// sort themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffResult {
    /// IDs present in the authoritative snapshot but absent from the cache
    /// (candidates for creation).
    pub missing_from_cache: HashSet<String>,
    /// IDs present in the cache but absent from the authoritative snapshot
    /// (candidates for deletion from the cache).
    pub missing_from_authoritative: HashSet<String>,
}

impl DiffResult {
    /// True when both ID sets already agree.
    pub fn is_converged(&self) -> bool {
        self.missing_from_cache.is_empty() && self.missing_from_authoritative.is_empty()
    }
}

/// Compute both directions of drift between two ID sets. Pure, O(n).
pub fn diff_ids(cached: &HashSet<String>, authoritative: &HashSet<String>) -> DiffResult {
    DiffResult {
        missing_from_cache: authoritative.difference(cached).cloned().collect(),
        missing_from_authoritative: cached.difference(authoritative).cloned().collect(),
    }
}

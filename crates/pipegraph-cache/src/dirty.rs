//! Incremental re-computation dirty detection.
//!
//! Compares a previous [`UidSnapshot`] against the current graph state to
//! determine which nodes need to run again. A node is dirty when any of its
//! outputs fingerprints differently; changes to parameters outside every
//! fingerprint group (log verbosity, metadata) therefore never dirty it.

use std::collections::HashSet;

use pipegraph_core::Graph;

use crate::error::CacheError;
use crate::snapshot::UidSnapshot;

/// The set of nodes whose cached results are stale.
///
/// Tracks three categories: new (absent from the previous snapshot),
/// modified (an output fingerprint changed), and removed (present only in
/// the previous snapshot). `new` and `modified` are in traversal order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirtySet {
    /// Nodes added since the previous snapshot.
    pub new: Vec<String>,
    /// Nodes whose type or output fingerprints changed.
    pub modified: Vec<String>,
    /// Nodes that no longer exist.
    pub removed: Vec<String>,
    /// Every current node, in traversal order.
    order: Vec<String>,
}

impl DirtySet {
    /// Categorizes every node of `current` against `previous`.
    pub fn between(current: &UidSnapshot, previous: &UidSnapshot) -> Self {
        let mut dirty = DirtySet::default();

        for (name, node) in &current.nodes {
            dirty.order.push(name.clone());
            match previous.get(name) {
                None => dirty.new.push(name.clone()),
                Some(prev) if prev.node_type != node.node_type || prev.outputs != node.outputs => {
                    dirty.modified.push(name.clone());
                }
                Some(_) => {}
            }
        }

        dirty.removed = previous
            .nodes
            .keys()
            .filter(|name| !current.nodes.contains_key(*name))
            .cloned()
            .collect();

        tracing::debug!(
            "dirty set: {} new, {} modified, {} removed",
            dirty.new.len(),
            dirty.modified.len(),
            dirty.removed.len()
        );
        dirty
    }

    /// All nodes needing re-computation (new + modified), in traversal order.
    pub fn needs_recompute(&self) -> Vec<String> {
        let stale: HashSet<&String> = self.new.iter().chain(&self.modified).collect();
        self.order
            .iter()
            .filter(|name| stale.contains(name))
            .cloned()
            .collect()
    }

    /// Returns true if nothing changed.
    pub fn is_clean(&self) -> bool {
        self.new.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }

    /// Total count of dirty nodes (new + modified + removed).
    pub fn total(&self) -> usize {
        self.new.len() + self.modified.len() + self.removed.len()
    }
}

/// Compute the dirty set by comparing a previous snapshot against the
/// current graph.
pub fn compute_dirty_set(graph: &Graph, previous: &UidSnapshot) -> Result<DirtySet, CacheError> {
    let current = UidSnapshot::from_graph(graph)?;
    Ok(DirtySet::between(&current, previous))
}

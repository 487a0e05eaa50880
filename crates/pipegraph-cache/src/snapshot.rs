//! Whole-graph fingerprint snapshots.
//!
//! A [`UidSnapshot`] records, for every node in traversal order, its type,
//! its node fingerprint per group and the merged fingerprint of each output.
//! Persisting one after a run lets the next run tell which nodes still have
//! valid results on disk.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use pipegraph_core::{Graph, Uid};

use crate::error::CacheError;

/// Fingerprints of one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSnapshot {
    pub node_type: String,
    /// Group placeholder (`uid0`, ...) -> node fingerprint.
    pub uids: IndexMap<String, Uid>,
    /// Output key -> merged output fingerprint.
    pub outputs: IndexMap<String, Uid>,
}

/// Fingerprints of every node in a graph, keyed by node name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UidSnapshot {
    pub nodes: IndexMap<String, NodeSnapshot>,
}

impl UidSnapshot {
    /// Fingerprints every node, in traversal order.
    pub fn from_graph(graph: &Graph) -> Result<Self, CacheError> {
        let fingerprinter = graph.fingerprinter();
        let traversal = graph.traverse()?;

        let mut nodes = IndexMap::with_capacity(traversal.nodes.len());
        for name in &traversal.nodes {
            let node = graph.node(name)?;

            let mut uids = IndexMap::new();
            for group in node.node().desc().uid_groups() {
                uids.insert(group.to_string(), fingerprinter.node_uid(node.id(), group)?);
            }

            let mut outputs = IndexMap::new();
            for output in node.outputs() {
                outputs.insert(
                    output.key().to_string(),
                    fingerprinter.attribute_uid(node.id(), output.key(), None)?,
                );
            }

            nodes.insert(
                name.clone(),
                NodeSnapshot {
                    node_type: node.type_id().to_string(),
                    uids,
                    outputs,
                },
            );
        }

        tracing::debug!("snapshotted {} nodes", nodes.len());
        Ok(UidSnapshot { nodes })
    }

    pub fn get(&self, name: &str) -> Option<&NodeSnapshot> {
        self.nodes.get(name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Writes the snapshot as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), CacheError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        tracing::debug!("saved snapshot to {}", path.display());
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)?;
        let snapshot = serde_json::from_str(&json)?;
        tracing::debug!("loaded snapshot from {}", path.display());
        Ok(snapshot)
    }
}

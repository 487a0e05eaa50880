//! Edge records.
//!
//! An edge binds an input attribute of one node to an output attribute of
//! another. The graph stores the attribute keys as the petgraph edge weight;
//! the endpoints are the petgraph source and target nodes. [`EdgeRecord`]
//! is the name-resolved form handed out to callers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Edge weight in the graph arena: which output feeds which input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    /// Output attribute key on the source node.
    pub source_key: String,
    /// Input attribute key on the destination node.
    pub dest_key: String,
}

/// An edge with both endpoints resolved to node names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub source: String,
    pub source_key: String,
    pub dest: String,
    pub dest_key: String,
}

impl EdgeRecord {
    /// The link expression an input bound to this edge projects as.
    pub fn link_expr(&self) -> String {
        format!("{{{}.{}}}", self.source, self.source_key)
    }
}

impl fmt::Display for EdgeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} -> {}.{}",
            self.source, self.source_key, self.dest, self.dest_key
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_link_expression() {
        let edge = EdgeRecord {
            source: "CameraInit_1".into(),
            source_key: "output".into(),
            dest: "FeatureExtraction_1".into(),
            dest_key: "input".into(),
        };
        assert_eq!(
            edge.to_string(),
            "CameraInit_1.output -> FeatureExtraction_1.input"
        );
        assert_eq!(edge.link_expr(), "{CameraInit_1.output}");
    }
}

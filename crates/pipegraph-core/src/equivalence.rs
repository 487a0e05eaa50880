//! Fingerprint equivalence between two graphs.
//!
//! Two graphs are equivalent when every node name present in either is
//! present in both with the same type, every input has equal per-group
//! fingerprints, and every output has an equal merged fingerprint. This is
//! the property a result cache relies on. It is weaker than
//! structural equality: node insertion history, cache directories and
//! ungrouped attributes do not matter.

use std::fmt;

use crate::error::CoreError;
use crate::graph::Graph;
use crate::id::UidGroup;
use crate::uid::Fingerprinter;
use crate::view::NodeRef;

/// One reason two graphs are not equivalent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mismatch {
    /// The node exists on only one side.
    MissingNode { node: String },
    /// Both sides have the node, with different types.
    NodeType {
        node: String,
        left: String,
        right: String,
    },
    /// An attribute fingerprint differs. `group` is `None` for outputs,
    /// which compare merged fingerprints.
    Fingerprint {
        node: String,
        key: String,
        group: Option<UidGroup>,
    },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::MissingNode { node } => write!(f, "node '{}' exists on one side only", node),
            Mismatch::NodeType { node, left, right } => {
                write!(f, "node '{}' is {} on one side, {} on the other", node, left, right)
            }
            Mismatch::Fingerprint {
                node,
                key,
                group: Some(group),
            } => write!(f, "'{}.{}' differs in {}", node, key, group),
            Mismatch::Fingerprint {
                node,
                key,
                group: None,
            } => write!(f, "'{}.{}' differs", node, key),
        }
    }
}

impl Graph {
    /// Returns `true` if the two graphs are fingerprint-equivalent.
    pub fn is_equivalent(&self, other: &Graph) -> Result<bool, CoreError> {
        Ok(self.equivalence_mismatches(other)?.is_empty())
    }

    /// Every mismatch between the two graphs, in this graph's node order
    /// followed by nodes present only in `other`.
    pub fn equivalence_mismatches(&self, other: &Graph) -> Result<Vec<Mismatch>, CoreError> {
        let left_fp = self.fingerprinter();
        let right_fp = other.fingerprinter();
        let mut mismatches = Vec::new();

        for left in self.nodes() {
            let Ok(right) = other.node(left.name()) else {
                mismatches.push(Mismatch::MissingNode {
                    node: left.name().to_string(),
                });
                continue;
            };
            compare_nodes(&left, &left_fp, &right, &right_fp, &mut mismatches)?;
        }

        for right in other.nodes() {
            if !self.contains(right.name()) {
                mismatches.push(Mismatch::MissingNode {
                    node: right.name().to_string(),
                });
            }
        }

        if !mismatches.is_empty() {
            tracing::debug!("graphs differ in {} places", mismatches.len());
        }
        Ok(mismatches)
    }
}

fn compare_nodes(
    left: &NodeRef<'_>,
    left_fp: &Fingerprinter<'_>,
    right: &NodeRef<'_>,
    right_fp: &Fingerprinter<'_>,
    out: &mut Vec<Mismatch>,
) -> Result<(), CoreError> {
    if left.type_id() != right.type_id() {
        out.push(Mismatch::NodeType {
            node: left.name().to_string(),
            left: left.type_id().to_string(),
            right: right.type_id().to_string(),
        });
        return Ok(());
    }

    for attr in left.node().attributes() {
        let key = attr.name();
        let groups: Vec<Option<UidGroup>> = if attr.is_output() {
            vec![None]
        } else {
            attr.desc().uid_groups().iter().copied().map(Some).collect()
        };
        for group in groups {
            let l = left_fp.attribute_uid(left.id(), key, group)?;
            let r = right_fp.attribute_uid(right.id(), key, group)?;
            if l != r {
                out.push(Mismatch::Fingerprint {
                    node: left.name().to_string(),
                    key: key.to_string(),
                    group,
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::desc::{AttributeDesc, NodeDesc};

    use super::*;

    fn init() -> Arc<NodeDesc> {
        Arc::new(NodeDesc::new(
            "Init",
            vec![
                AttributeDesc::file("image", "").in_group(UidGroup::PRIMARY),
                AttributeDesc::string("comment", ""),
            ],
            vec![AttributeDesc::output("output", "{cache}/{nodeType}/{uid0}/")],
        ).unwrap())
    }

    fn step() -> Arc<NodeDesc> {
        Arc::new(NodeDesc::new(
            "Step",
            vec![AttributeDesc::file("input", "").in_group(UidGroup::PRIMARY)],
            vec![AttributeDesc::output("output", "{cache}/{nodeType}/{uid0}/")],
        ).unwrap())
    }

    fn pair(image: &str) -> Graph {
        let mut g = Graph::new();
        g.add_node(&init());
        g.add_node(&step());
        g.set_value("Init_1", "image", image).unwrap();
        g.connect("Init_1", "output", "Step_1", "input").unwrap();
        g
    }

    #[test]
    fn equal_content_is_equivalent() {
        assert!(pair("/a").is_equivalent(&pair("/a")).unwrap());
    }

    #[test]
    fn construction_order_does_not_matter() {
        let mut g = Graph::new();
        g.add_node(&step());
        g.add_node(&init());
        g.connect("Init_1", "output", "Step_1", "input").unwrap();
        g.set_value("Init_1", "image", "/a").unwrap();
        assert!(g.is_equivalent(&pair("/a")).unwrap());
    }

    #[test]
    fn ungrouped_attributes_are_ignored() {
        let mut g = pair("/a");
        g.set_value("Init_1", "comment", "hello").unwrap();
        assert!(g.is_equivalent(&pair("/a")).unwrap());
    }

    #[test]
    fn a_changed_input_is_reported_along_the_chain() {
        let mismatches = pair("/a").equivalence_mismatches(&pair("/b")).unwrap();
        assert_eq!(
            mismatches,
            vec![
                Mismatch::Fingerprint {
                    node: "Init_1".into(),
                    key: "image".into(),
                    group: Some(UidGroup::PRIMARY),
                },
                Mismatch::Fingerprint {
                    node: "Init_1".into(),
                    key: "output".into(),
                    group: None,
                },
                Mismatch::Fingerprint {
                    node: "Step_1".into(),
                    key: "input".into(),
                    group: Some(UidGroup::PRIMARY),
                },
                Mismatch::Fingerprint {
                    node: "Step_1".into(),
                    key: "output".into(),
                    group: None,
                },
            ]
        );
        assert_eq!(mismatches[0].to_string(), "'Init_1.image' differs in uid0");
    }

    #[test]
    fn missing_nodes_are_reported_from_both_sides() {
        let mut left = pair("/a");
        left.remove_node("Step_1").unwrap();
        let mut right = pair("/a");
        right.add_node(&step());

        let mismatches = left.equivalence_mismatches(&right).unwrap();
        assert_eq!(
            mismatches,
            vec![
                Mismatch::MissingNode {
                    node: "Step_1".into()
                },
                Mismatch::MissingNode {
                    node: "Step_2".into()
                },
            ]
        );
    }
}

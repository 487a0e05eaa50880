//! Deterministic content fingerprints ("UIDs") using blake3.
//!
//! Every fingerprint is a blake3 hash over an order-preserving token stream.
//! The stream is built depth-first from *actual* values, so an attribute left
//! at its default and one explicitly set to the same value hash identically.
//!
//! # Levels
//!
//! - **Attribute**: scalar token, or the ordered uids of a list's elements,
//!   or the `(key, uid)` pairs of a group's fields declared in the group.
//! - **Node**: per fingerprint group, the `(key, uid)` pairs of every input
//!   declared in that group, in declaration order. Inputs bound to an edge
//!   contribute the source output's uid instead of their own value.
//! - **Output**: type id, key and path template, folded with the node uid of
//!   each group the output declares.
//!
//! `uid(None)` is never a separate code path: it is the ordered
//! concatenation of `uid(Some(g))` over the declared groups.
//!
//! # Determinism
//!
//! Node names, the cache directory, and edge or node insertion history never
//! enter the stream. Every iteration that affects a hash follows descriptor
//! declaration order; no `HashMap` is iterated.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::attribute::{Attribute, AttributeValue};
use crate::desc::{AttributeDesc, NodeDesc};
use crate::error::CoreError;
use crate::graph::Graph;
use crate::id::{NodeId, UidGroup};
use crate::value::Value;

/// A 32-byte fingerprint, rendered as 64 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Uid([u8; 32]);

impl Uid {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        blake3::Hash::from(self.0).to_hex().to_string()
    }
}

impl From<blake3::Hash> for Uid {
    fn from(hash: blake3::Hash) -> Self {
        Uid(hash.into())
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Uid({})", self.to_hex())
    }
}

impl FromStr for Uid {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        blake3::Hash::from_hex(s)
            .map(Uid::from)
            .map_err(|e| e.to_string())
    }
}

impl From<Uid> for String {
    fn from(uid: Uid) -> Self {
        uid.to_hex()
    }
}

impl TryFrom<String> for Uid {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

// ---------------------------------------------------------------------------
// Token stream
// ---------------------------------------------------------------------------

/// Length-prefixed, domain-separated token writer over a blake3 hasher.
struct UidHasher(blake3::Hasher);

impl UidHasher {
    fn new(domain: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(domain.as_bytes());
        hasher.update(&[0]);
        UidHasher(hasher)
    }

    fn bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.0.update(&(bytes.len() as u64).to_le_bytes());
        self.0.update(bytes);
        self
    }

    fn str(&mut self, s: &str) -> &mut Self {
        self.bytes(s.as_bytes())
    }

    fn u64(&mut self, n: u64) -> &mut Self {
        self.0.update(&n.to_le_bytes());
        self
    }

    fn group(&mut self, group: UidGroup) -> &mut Self {
        self.0.update(&group.0.to_le_bytes());
        self
    }

    fn uid(&mut self, uid: &Uid) -> &mut Self {
        self.0.update(&uid.0);
        self
    }

    fn value(&mut self, value: &Value) -> &mut Self {
        match value {
            Value::Bool(b) => {
                self.0.update(&[0, u8::from(*b)]);
            }
            Value::Int(i) => {
                self.0.update(&[1]);
                self.0.update(&i.to_le_bytes());
            }
            Value::Float(f) => {
                // Equal OrderedFloats must hash equal: fold -0.0 and NaNs.
                let x = if f.0 == 0.0 {
                    0.0
                } else if f.0.is_nan() {
                    f64::NAN
                } else {
                    f.0
                };
                self.0.update(&[2]);
                self.0.update(&x.to_bits().to_le_bytes());
            }
            Value::String(s) => {
                self.0.update(&[3]);
                self.str(s);
            }
        }
        self
    }

    fn finish(&self) -> Uid {
        self.0.finalize().into()
    }
}

/// Combines per-group uids, in the given (ascending) group order.
fn merge_groups(parts: &[(UidGroup, Uid)]) -> Uid {
    let mut hasher = UidHasher::new("groups");
    for (group, uid) in parts {
        hasher.group(*group).uid(uid);
    }
    hasher.finish()
}

/// Fingerprint of a single scalar value.
pub fn value_uid(value: &Value) -> Uid {
    UidHasher::new("scalar").value(value).finish()
}

/// Fingerprint of an attribute's own value tree, ignoring edges.
///
/// With `Some(group)`, list elements and group fields outside `group` are
/// skipped. With `None`, the result folds every group the descriptor
/// declares.
pub fn attribute_uid(attr: &Attribute, group: Option<UidGroup>) -> Uid {
    let Some(group) = group else {
        let parts: Vec<(UidGroup, Uid)> = attr
            .desc()
            .uid_groups()
            .iter()
            .map(|g| (*g, attribute_uid(attr, Some(*g))))
            .collect();
        return merge_groups(&parts);
    };

    match attr.value() {
        AttributeValue::Scalar(v) => value_uid(v),
        AttributeValue::List(items) => {
            let members: Vec<&Attribute> = items
                .iter()
                .filter(|item| item.desc().in_uid_group(group))
                .collect();
            let mut hasher = UidHasher::new("list");
            hasher.u64(members.len() as u64);
            for item in members {
                hasher.uid(&attribute_uid(item, Some(group)));
            }
            hasher.finish()
        }
        AttributeValue::Group(fields) => {
            let mut hasher = UidHasher::new("group");
            for (key, field) in fields {
                if field.desc().in_uid_group(group) {
                    hasher.str(key).uid(&attribute_uid(field, Some(group)));
                }
            }
            hasher.finish()
        }
    }
}

// ---------------------------------------------------------------------------
// Graph-aware fingerprints
// ---------------------------------------------------------------------------

/// Every group a node of this type is fingerprinted under: those of its
/// inputs and those its outputs declare.
fn node_groups(desc: &NodeDesc) -> BTreeSet<UidGroup> {
    desc.uid_groups()
        .into_iter()
        .chain(desc.outputs().flat_map(|out| out.uid_groups().iter().copied()))
        .collect()
}

/// Computes graph-aware fingerprints, following edges upstream.
///
/// Results are memoized for the lifetime of the fingerprinter, so one
/// instance must not outlive a mutation of the graph. The `&Graph` borrow
/// enforces that. Several fingerprinters may run concurrently over the same
/// graph; each keeps its own memo.
pub struct Fingerprinter<'g> {
    graph: &'g Graph,
    node_uids: RefCell<HashMap<(NodeId, UidGroup), Uid>>,
    output_uids: RefCell<HashMap<(NodeId, String, Option<UidGroup>), Uid>>,
}

impl<'g> Fingerprinter<'g> {
    pub fn new(graph: &'g Graph) -> Self {
        Fingerprinter {
            graph,
            node_uids: RefCell::new(HashMap::new()),
            output_uids: RefCell::new(HashMap::new()),
        }
    }

    /// Fingerprint of a node's attribute.
    ///
    /// - Inputs bound to an edge resolve to the source output's `uid(None)`.
    /// - Other inputs hash their own value, as [`attribute_uid`].
    /// - Outputs fold the node uid of each requested group they declare.
    pub fn attribute_uid(
        &self,
        node: NodeId,
        key: &str,
        group: Option<UidGroup>,
    ) -> Result<Uid, CoreError> {
        let attr = self.graph.node_by_id(node)?.attribute(key)?;

        if attr.is_output() {
            return self.output_uid(node, attr.desc(), group);
        }

        if let Some((source, edge)) = self.graph.incoming(node, key) {
            return self.attribute_uid(source, &edge.source_key, None);
        }

        Ok(attribute_uid(attr, group))
    }

    /// Fingerprint of a node for one group: every input declared in the
    /// group, in declaration order, prefixed by the node type.
    pub fn node_uid(&self, node: NodeId, group: UidGroup) -> Result<Uid, CoreError> {
        if let Some(uid) = self.memoized(node, group) {
            return Ok(uid);
        }
        self.settle(node)?;
        match self.memoized(node, group) {
            Some(uid) => Ok(uid),
            None => self.compute_node_uid(node, group),
        }
    }

    /// Fills the node memo for `node` and everything upstream of it,
    /// dependencies first. Every linked input then resolves against a
    /// memoized source, so no lookup follows more than one edge.
    fn settle(&self, node: NodeId) -> Result<(), CoreError> {
        let order = self.graph.finish_order(node, |id| self.is_settled(id))?;
        tracing::trace!("settling {} nodes", order.len());
        for id in order {
            for group in node_groups(self.graph.node_by_id(id)?.desc()) {
                if self.memoized(id, group).is_none() {
                    self.compute_node_uid(id, group)?;
                }
            }
        }
        Ok(())
    }

    fn is_settled(&self, node: NodeId) -> bool {
        let Ok(n) = self.graph.node_by_id(node) else {
            return false;
        };
        let memo = self.node_uids.borrow();
        node_groups(n.desc())
            .into_iter()
            .all(|group| memo.contains_key(&(node, group)))
    }

    fn memoized(&self, node: NodeId, group: UidGroup) -> Option<Uid> {
        self.node_uids.borrow().get(&(node, group)).copied()
    }

    fn compute_node_uid(&self, node: NodeId, group: UidGroup) -> Result<Uid, CoreError> {
        let n = self.graph.node_by_id(node)?;
        let mut hasher = UidHasher::new("node");
        hasher.str(n.type_id()).group(group);
        for input in n.desc().inputs().filter(|input| input.in_uid_group(group)) {
            let uid = self.attribute_uid(node, input.name(), Some(group))?;
            hasher.str(input.name()).uid(&uid);
        }

        let uid = hasher.finish();
        self.node_uids.borrow_mut().insert((node, group), uid);
        Ok(uid)
    }

    fn output_uid(
        &self,
        node: NodeId,
        desc: &AttributeDesc,
        group: Option<UidGroup>,
    ) -> Result<Uid, CoreError> {
        let memo_key = (node, desc.name().to_string(), group);
        if let Some(uid) = self.output_uids.borrow().get(&memo_key) {
            return Ok(*uid);
        }

        let groups: Vec<UidGroup> = match group {
            None => desc.uid_groups().to_vec(),
            Some(g) if desc.in_uid_group(g) => vec![g],
            Some(_) => Vec::new(),
        };

        let n = self.graph.node_by_id(node)?;
        let mut hasher = UidHasher::new("output");
        hasher.str(n.type_id()).str(desc.name());
        if let Some(template) = desc.default_value() {
            hasher.value(template);
        }
        for g in groups {
            let node_uid = self.node_uid(node, g)?;
            hasher.group(g).uid(&node_uid);
        }

        let uid = hasher.finish();
        self.output_uids.borrow_mut().insert(memo_key, uid);
        Ok(uid)
    }
}

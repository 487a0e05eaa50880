//! Graph: the container owning every node and the edge relation.
//!
//! [`Graph`] is the single entry point for building and querying pipelines.
//! Nodes live in a petgraph `StableGraph` arena. The edge weights are
//! [`Edge`] records naming the output and input attribute keys, so no node
//! ever holds a reference to another.
//!
//! # Invariants
//!
//! - Node names are unique. `names` preserves insertion order, which is what
//!   every ordered query (`nodes`, `find_node`, traversal tie-breaks) uses;
//!   arena indices are reused after removal and carry no order.
//! - An edge always runs from an output attribute to an input attribute of a
//!   different node, and an input has at most one incoming edge.
//! - The edge relation is acyclic. `connect` rejects a binding that would
//!   close a cycle before touching the graph.

use std::sync::Arc;

use indexmap::IndexMap;
use petgraph::algo::has_path_connecting;
use petgraph::graph::EdgeIndex;
use petgraph::stable_graph::StableGraph;
use petgraph::visit::EdgeRef;
use petgraph::{Directed, Direction};

use crate::attribute::{Attribute, AttributeValue, Input};
use crate::config::GraphConfig;
use crate::desc::{AttributeKind, NodeDesc};
use crate::edge::{Edge, EdgeRecord};
use crate::error::CoreError;
use crate::id::{EdgeId, NodeId, UidGroup};
use crate::node::Node;
use crate::uid::Fingerprinter;
use crate::view::NodeRef;

/// The pipeline graph.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    graph: StableGraph<Node, Edge, Directed, u32>,
    /// Node name -> id, in insertion order.
    names: IndexMap<String, NodeId>,
    config: GraphConfig,
}

impl Graph {
    pub fn new() -> Self {
        Graph::default()
    }

    pub fn with_config(config: GraphConfig) -> Self {
        Graph {
            config,
            ..Graph::default()
        }
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Nodes
    // -----------------------------------------------------------------------

    /// Adds a node named `<TypeId>_<n>`, taking the first free `n` from 1.
    pub fn add_node(&mut self, desc: &Arc<NodeDesc>) -> NodeId {
        let name = (1..)
            .map(|n| format!("{}_{}", desc.type_id(), n))
            .find(|candidate| !self.names.contains_key(candidate))
            .unwrap_or_else(|| desc.type_id().to_string());
        self.insert_node(name, desc)
    }

    /// Adds a node with an explicit name. Fails if the name is taken.
    pub fn add_node_named(&mut self, name: &str, desc: &Arc<NodeDesc>) -> Result<NodeId, CoreError> {
        if self.names.contains_key(name) {
            return Err(CoreError::DuplicateNodeName {
                name: name.to_string(),
            });
        }
        Ok(self.insert_node(name.to_string(), desc))
    }

    fn insert_node(&mut self, name: String, desc: &Arc<NodeDesc>) -> NodeId {
        let node = Node::new(&name, Arc::clone(desc));
        let id = NodeId::from(self.graph.add_node(node));
        tracing::debug!("added node {} ({})", name, desc.type_id());
        self.names.insert(name, id);

        #[cfg(debug_assertions)]
        self.assert_consistency();

        id
    }

    /// Removes a node and every edge touching it.
    pub fn remove_node(&mut self, name: &str) -> Result<Node, CoreError> {
        let id = self.id_of(name)?;
        let node = self
            .graph
            .remove_node(id.into())
            .ok_or_else(|| not_found(name))?;
        self.names.shift_remove(name);
        tracing::debug!("removed node {}", name);

        #[cfg(debug_assertions)]
        self.assert_consistency();

        Ok(node)
    }

    /// The node with the exact name `name`.
    pub fn node(&self, name: &str) -> Result<NodeRef<'_>, CoreError> {
        let id = self.id_of(name)?;
        Ok(NodeRef::new(self, id, self.node_by_id(id)?))
    }

    /// The first node (in insertion order) whose type is `type_id`.
    pub fn find_node(&self, type_id: &str) -> Result<NodeRef<'_>, CoreError> {
        self.nodes()
            .find(|n| n.type_id() == type_id)
            .ok_or_else(|| not_found(type_id))
    }

    /// Every node whose type is `type_id`, in insertion order.
    pub fn find_nodes<'g>(&'g self, type_id: &'g str) -> impl Iterator<Item = NodeRef<'g>> + 'g {
        self.nodes().filter(move |n| n.type_id() == type_id)
    }

    /// All nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeRef<'_>> {
        self.names
            .values()
            .filter_map(|id| self.graph.node_weight((*id).into()).map(|n| NodeRef::new(self, *id, n)))
    }

    pub fn id_of(&self, name: &str) -> Result<NodeId, CoreError> {
        self.names.get(name).copied().ok_or_else(|| not_found(name))
    }

    pub fn node_by_id(&self, id: NodeId) -> Result<&Node, CoreError> {
        self.graph
            .node_weight(id.into())
            .ok_or_else(|| not_found(&format!("#{}", id)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    // -----------------------------------------------------------------------
    // Values
    // -----------------------------------------------------------------------

    /// Sets an input attribute's value. A linked input loses its link.
    ///
    /// Output attributes are derived from their template and cannot be
    /// written. On error, neither the value nor the link changes.
    pub fn set_value(&mut self, node: &str, key: &str, input: impl Into<Input>) -> Result<(), CoreError> {
        let id = self.id_of(node)?;
        self.writable_attribute(id, key)?.set_value(input)?;
        self.unlink(id, key);
        Ok(())
    }

    /// Mutable access to an input attribute, for list and group edits.
    /// A linked input loses its link.
    pub fn attribute_mut(&mut self, node: &str, key: &str) -> Result<&mut Attribute, CoreError> {
        let id = self.id_of(node)?;
        self.writable_attribute(id, key)?;
        self.unlink(id, key);
        self.writable_attribute(id, key)
    }

    fn writable_attribute(&mut self, id: NodeId, key: &str) -> Result<&mut Attribute, CoreError> {
        let node = self
            .graph
            .node_weight_mut(id.into())
            .ok_or_else(|| not_found(&format!("#{}", id)))?;
        let attr = node.attribute_mut(key)?;
        if attr.is_output() {
            return Err(CoreError::TypeMismatch {
                attribute: key.to_string(),
                expected: "input".to_string(),
                found: "output".to_string(),
            });
        }
        Ok(attr)
    }

    // -----------------------------------------------------------------------
    // Edges
    // -----------------------------------------------------------------------

    /// Binds `dest.dest_key` to `source.source_key`.
    ///
    /// The source attribute must be an output, the destination an input of a
    /// different node, and the destination a scalar that holds paths. Any
    /// prior edge on the destination is replaced. A binding that would close
    /// a cycle fails with `CyclicGraph` and leaves the graph unchanged.
    pub fn connect(
        &mut self,
        source: &str,
        source_key: &str,
        dest: &str,
        dest_key: &str,
    ) -> Result<EdgeId, CoreError> {
        let src_id = self.id_of(source)?;
        let dst_id = self.id_of(dest)?;

        if src_id == dst_id {
            return Err(CoreError::InvalidEdge {
                reason: format!("cannot bind node '{}' to itself", source),
            });
        }

        let src_attr = self.node_by_id(src_id)?.attribute(source_key)?;
        if !src_attr.is_output() {
            return Err(CoreError::InvalidEdge {
                reason: format!("source '{}.{}' is not an output", source, source_key),
            });
        }

        let dst_attr = self.node_by_id(dst_id)?.attribute(dest_key)?;
        if dst_attr.is_output() {
            return Err(CoreError::InvalidEdge {
                reason: format!("destination '{}.{}' is not an input", dest, dest_key),
            });
        }
        match dst_attr.desc().kind() {
            AttributeKind::Scalar { kind, .. } if kind.accepts_path() => {}
            other => {
                return Err(CoreError::InvalidEdge {
                    reason: format!(
                        "destination '{}.{}' of kind {} cannot hold a path",
                        dest,
                        dest_key,
                        other.name()
                    ),
                });
            }
        }

        // A path dest -> source means the new edge source -> dest closes a
        // cycle. The existing edge into dest_key cannot lie on such a path.
        if has_path_connecting(&self.graph, dst_id.into(), src_id.into(), None) {
            return Err(CoreError::CyclicGraph {
                node: dest.to_string(),
            });
        }

        if self.unlink(dst_id, dest_key) {
            tracing::debug!("replacing edge into {}.{}", dest, dest_key);
        }

        let weight = Edge {
            source_key: source_key.to_string(),
            dest_key: dest_key.to_string(),
        };
        let idx = self.graph.add_edge(src_id.into(), dst_id.into(), weight);
        tracing::debug!("bound {}.{} -> {}.{}", source, source_key, dest, dest_key);

        Ok(EdgeId::from(idx))
    }

    /// Removes the edge into `dest.dest_key`. Returns whether one existed.
    pub fn disconnect(&mut self, dest: &str, dest_key: &str) -> Result<bool, CoreError> {
        let id = self.id_of(dest)?;
        self.node_by_id(id)?.attribute(dest_key)?;
        Ok(self.unlink(id, dest_key))
    }

    fn unlink(&mut self, id: NodeId, key: &str) -> bool {
        let existing: Option<EdgeIndex<u32>> = self
            .graph
            .edges_directed(id.into(), Direction::Incoming)
            .find(|e| e.weight().dest_key == key)
            .map(|e| e.id());
        match existing {
            Some(edge) => self.graph.remove_edge(edge).is_some(),
            None => false,
        }
    }

    /// The source node and edge weight bound to `node.key`, if linked.
    pub(crate) fn incoming(&self, node: NodeId, key: &str) -> Option<(NodeId, &Edge)> {
        self.graph
            .edges_directed(node.into(), Direction::Incoming)
            .find(|e| e.weight().dest_key == key)
            .map(|e| (NodeId::from(e.source()), e.weight()))
    }

    /// The resolved edge bound to `node.key`, if linked.
    pub(crate) fn link(&self, node: NodeId, key: &str) -> Option<EdgeRecord> {
        let (source, edge) = self.incoming(node, key)?;
        Some(EdgeRecord {
            source: self.graph.node_weight(source.into())?.name().to_string(),
            source_key: edge.source_key.clone(),
            dest: self.graph.node_weight(node.into())?.name().to_string(),
            dest_key: edge.dest_key.clone(),
        })
    }

    /// Nodes fed by `node` through at least one edge.
    pub(crate) fn targets_of(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.graph
            .neighbors_directed(node.into(), Direction::Outgoing)
            .map(NodeId::from)
    }

    pub(crate) fn has_outgoing(&self, node: NodeId) -> bool {
        self.graph
            .neighbors_directed(node.into(), Direction::Outgoing)
            .next()
            .is_some()
    }

    /// All edges, ordered by destination node insertion order, then by
    /// destination attribute declaration order.
    pub fn edges(&self) -> Vec<EdgeRecord> {
        let mut out = Vec::with_capacity(self.graph.edge_count());
        for id in self.names.values() {
            let Some(node) = self.graph.node_weight((*id).into()) else {
                continue;
            };
            for input in node.inputs() {
                if let Some(edge) = self.link(*id, input.name()) {
                    out.push(edge);
                }
            }
        }
        out
    }

    // -----------------------------------------------------------------------
    // Fingerprints and outputs
    // -----------------------------------------------------------------------

    /// A fresh fingerprinter over the current state of the graph.
    pub fn fingerprinter(&self) -> Fingerprinter<'_> {
        Fingerprinter::new(self)
    }

    /// Resolves an output attribute's path template.
    ///
    /// `{cache}` becomes the configured cache directory, `{nodeType}` the
    /// node's type id and `{uidN}` the hex node fingerprint for group N.
    /// Unknown placeholders are kept verbatim.
    pub fn output_path(&self, node: &str, key: &str) -> Result<String, CoreError> {
        let id = self.id_of(node)?;
        self.resolve_output(&self.fingerprinter(), id, key)
    }

    pub(crate) fn resolve_output(
        &self,
        fingerprinter: &Fingerprinter<'_>,
        id: NodeId,
        key: &str,
    ) -> Result<String, CoreError> {
        let node = self.node_by_id(id)?;
        let attr = node.attribute(key)?;
        let template = match attr.value() {
            AttributeValue::Scalar(v) if attr.is_output() => v.to_string(),
            _ => {
                return Err(CoreError::InvalidEdge {
                    reason: format!("'{}.{}' is not an output", node.name(), key),
                });
            }
        };

        let mut out = String::with_capacity(template.len() + 64);
        let mut rest = template.as_str();
        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            let Some(end) = after.find('}') else {
                out.push_str(&rest[start..]);
                rest = "";
                break;
            };
            let token = &after[..end];
            match token {
                "cache" => out.push_str(&self.config.cache_dir),
                "nodeType" => out.push_str(node.type_id()),
                _ => match token.strip_prefix("uid").and_then(|g| g.parse::<u32>().ok()) {
                    Some(group) => out.push_str(&fingerprinter.node_uid(id, UidGroup(group))?.to_hex()),
                    None => {
                        out.push('{');
                        out.push_str(token);
                        out.push('}');
                    }
                },
            }
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }

    // -----------------------------------------------------------------------
    // Projection
    // -----------------------------------------------------------------------

    /// Projects the whole graph: node name -> `{nodeType, inputs, outputs}`,
    /// in insertion order.
    pub fn to_primitive(&self, export_default: bool) -> Result<serde_json::Value, CoreError> {
        let fingerprinter = self.fingerprinter();
        let mut map = serde_json::Map::new();
        for node in self.nodes() {
            map.insert(
                node.name().to_string(),
                node.project(&fingerprinter, export_default)?,
            );
        }
        Ok(serde_json::Value::Object(map))
    }

    // -----------------------------------------------------------------------
    // Debug consistency assertion
    // -----------------------------------------------------------------------

    /// Verifies that `names` and the arena agree.
    #[cfg(debug_assertions)]
    fn assert_consistency(&self) {
        assert_eq!(
            self.names.len(),
            self.graph.node_count(),
            "name index and arena disagree on node count"
        );
        for (name, id) in &self.names {
            let node = self
                .graph
                .node_weight((*id).into())
                .unwrap_or_else(|| panic!("node '{}' has no arena entry", name));
            assert_eq!(node.name(), name, "node name does not match its index key");
        }
    }
}

fn not_found(name: &str) -> CoreError {
    CoreError::NodeNotFound {
        name: name.to_string(),
    }
}

//! Borrowed, graph-aware views of nodes and attributes.
//!
//! A bare [`Node`] or [`Attribute`] knows nothing about edges. The views
//! carry the owning [`Graph`] along, so they can resolve links, fingerprint
//! through upstream nodes, and resolve output paths.

use crate::attribute::{Attribute, AttributeValue};
use crate::edge::EdgeRecord;
use crate::error::CoreError;
use crate::graph::Graph;
use crate::id::{NodeId, UidGroup};
use crate::node::Node;
use crate::uid::{Fingerprinter, Uid};
use crate::value::Value;

/// A node together with the graph that owns it.
#[derive(Debug, Clone, Copy)]
pub struct NodeRef<'g> {
    graph: &'g Graph,
    id: NodeId,
    node: &'g Node,
}

impl<'g> NodeRef<'g> {
    pub(crate) fn new(graph: &'g Graph, id: NodeId, node: &'g Node) -> Self {
        NodeRef { graph, id, node }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &'g str {
        self.node.name()
    }

    pub fn type_id(&self) -> &'g str {
        self.node.type_id()
    }

    pub fn node(&self) -> &'g Node {
        self.node
    }

    /// The attribute for `key`; fails with `UnknownAttribute` if absent.
    pub fn attribute(&self, key: &str) -> Result<AttributeRef<'g>, CoreError> {
        let attr = self.node.attribute(key)?;
        Ok(self.wrap(attr))
    }

    pub fn attributes(&self) -> impl Iterator<Item = AttributeRef<'g>> + 'g {
        let this = *self;
        self.node.attributes().map(move |a| this.wrap(a))
    }

    pub fn inputs(&self) -> impl Iterator<Item = AttributeRef<'g>> + 'g {
        let this = *self;
        self.node.inputs().map(move |a| this.wrap(a))
    }

    pub fn outputs(&self) -> impl Iterator<Item = AttributeRef<'g>> + 'g {
        let this = *self;
        self.node.outputs().map(move |a| this.wrap(a))
    }

    fn wrap(&self, attr: &'g Attribute) -> AttributeRef<'g> {
        AttributeRef {
            graph: self.graph,
            node_id: self.id,
            node: self.node,
            attr,
        }
    }

    /// Node fingerprint for one group.
    pub fn uid(&self, group: UidGroup) -> Result<Uid, CoreError> {
        self.graph.fingerprinter().node_uid(self.id, group)
    }

    /// Node fingerprints for every group the node type declares, ascending.
    pub fn uids(&self) -> Result<Vec<(UidGroup, Uid)>, CoreError> {
        let fingerprinter = self.graph.fingerprinter();
        self.node
            .desc()
            .uid_groups()
            .into_iter()
            .map(|g| Ok::<_, CoreError>((g, fingerprinter.node_uid(self.id, g)?)))
            .collect()
    }

    /// Resolved path of the output `key`.
    pub fn output_path(&self, key: &str) -> Result<String, CoreError> {
        self.graph
            .resolve_output(&self.graph.fingerprinter(), self.id, key)
    }

    /// `{ "nodeType", "inputs", "outputs" }`. Linked inputs project as their
    /// link expression, outputs as their resolved path.
    pub fn to_primitive(&self, export_default: bool) -> Result<serde_json::Value, CoreError> {
        self.project(&self.graph.fingerprinter(), export_default)
    }

    pub(crate) fn project(
        &self,
        fingerprinter: &Fingerprinter<'_>,
        export_default: bool,
    ) -> Result<serde_json::Value, CoreError> {
        let mut inputs = serde_json::Map::new();
        for input in self.inputs() {
            if let Some(link) = input.link() {
                inputs.insert(input.key().to_string(), link.link_expr().into());
            } else if export_default || !input.is_default() {
                inputs.insert(
                    input.key().to_string(),
                    input.attribute().to_primitive(export_default),
                );
            }
        }

        let mut outputs = serde_json::Map::new();
        for output in self.node.outputs() {
            let path = self
                .graph
                .resolve_output(fingerprinter, self.id, output.name())?;
            outputs.insert(output.name().to_string(), path.into());
        }

        let mut map = serde_json::Map::new();
        map.insert("nodeType".into(), self.type_id().into());
        map.insert("inputs".into(), inputs.into());
        map.insert("outputs".into(), outputs.into());
        Ok(serde_json::Value::Object(map))
    }
}

/// An attribute together with its node and graph.
#[derive(Debug, Clone, Copy)]
pub struct AttributeRef<'g> {
    graph: &'g Graph,
    node_id: NodeId,
    node: &'g Node,
    attr: &'g Attribute,
}

impl<'g> AttributeRef<'g> {
    /// The underlying attribute, for list and group access.
    pub fn attribute(&self) -> &'g Attribute {
        self.attr
    }

    pub fn key(&self) -> &'g str {
        self.attr.name()
    }

    pub fn node_name(&self) -> &'g str {
        self.node.name()
    }

    pub fn is_output(&self) -> bool {
        self.attr.is_output()
    }

    pub fn value(&self) -> &'g AttributeValue {
        self.attr.value()
    }

    pub fn scalar(&self) -> Option<&'g Value> {
        self.attr.scalar()
    }

    /// A linked input is never default, whatever value it holds locally.
    pub fn is_default(&self) -> bool {
        !self.is_linked() && self.attr.is_default()
    }

    /// The edge bound to this input, if any.
    pub fn link(&self) -> Option<EdgeRecord> {
        self.graph.link(self.node_id, self.attr.name())
    }

    pub fn is_linked(&self) -> bool {
        self.graph.incoming(self.node_id, self.attr.name()).is_some()
    }

    /// Graph-aware fingerprint.
    ///
    /// - Unlinked inputs hash their own value, restricted to `group`.
    /// - Linked inputs take the source output's merged fingerprint.
    /// - Outputs fold the node fingerprints of their groups.
    pub fn uid(&self, group: Option<UidGroup>) -> Result<Uid, CoreError> {
        self.graph
            .fingerprinter()
            .attribute_uid(self.node_id, self.attr.name(), group)
    }

    /// Plain projection: the link expression for linked inputs, the resolved
    /// path for outputs, the value tree otherwise.
    pub fn to_primitive(&self, export_default: bool) -> Result<serde_json::Value, CoreError> {
        if self.attr.is_output() {
            return Ok(self
                .graph
                .resolve_output(&self.graph.fingerprinter(), self.node_id, self.attr.name())?
                .into());
        }
        if let Some(link) = self.link() {
            return Ok(link.link_expr().into());
        }
        Ok(self.attr.to_primitive(export_default))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::desc::{AttributeDesc, NodeDesc};

    use super::*;

    fn graph() -> Graph {
        let init = Arc::new(NodeDesc::new(
            "Init",
            vec![
                AttributeDesc::file("image", "").in_group(UidGroup::PRIMARY),
                AttributeDesc::string("comment", ""),
            ],
            vec![AttributeDesc::output("output", "{cache}/{nodeType}/{uid0}/init.json")],
        ).unwrap());
        let step = Arc::new(NodeDesc::new(
            "Step",
            vec![
                AttributeDesc::file("input", "").in_group(UidGroup::PRIMARY),
                AttributeDesc::float("scale", 1.0).in_group(UidGroup::PRIMARY),
            ],
            vec![AttributeDesc::output("output", "{cache}/{nodeType}/{uid0}/")],
        ).unwrap());
        let mut g = Graph::new();
        g.add_node(&init);
        g.add_node(&step);
        g.connect("Init_1", "output", "Step_1", "input").unwrap();
        g
    }

    #[test]
    fn linked_inputs_are_not_default_and_project_as_links() {
        let g = graph();
        let input = g.node("Step_1").unwrap().attribute("input").unwrap();
        assert!(input.is_linked());
        assert!(!input.is_default());
        assert_eq!(
            input.to_primitive(false).unwrap(),
            serde_json::json!("{Init_1.output}")
        );
    }

    #[test]
    fn linked_input_takes_the_source_output_uid() {
        let g = graph();
        let input = g.node("Step_1").unwrap().attribute("input").unwrap();
        let output = g.node("Init_1").unwrap().attribute("output").unwrap();
        assert_eq!(input.uid(None).unwrap(), output.uid(None).unwrap());
        assert_eq!(
            input.uid(Some(UidGroup::PRIMARY)).unwrap(),
            output.uid(None).unwrap()
        );
    }

    #[test]
    fn upstream_change_propagates_downstream() {
        let mut g = graph();
        let before = g.node("Step_1").unwrap().attribute("output").unwrap().uid(None).unwrap();

        g.set_value("Init_1", "comment", "ungrouped").unwrap();
        let same = g.node("Step_1").unwrap().attribute("output").unwrap().uid(None).unwrap();
        assert_eq!(before, same);

        g.set_value("Init_1", "image", "/a.jpg").unwrap();
        let after = g.node("Step_1").unwrap().attribute("output").unwrap().uid(None).unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn node_uids_cover_declared_groups() {
        let g = graph();
        let node = g.node("Step_1").unwrap();
        let uids = node.uids().unwrap();
        assert_eq!(uids.len(), 1);
        assert_eq!(uids[0], (UidGroup::PRIMARY, node.uid(UidGroup::PRIMARY).unwrap()));
    }

    #[test]
    fn node_projection() {
        let mut g = graph();
        g.set_value("Step_1", "scale", 2).unwrap();
        let node = g.node("Step_1").unwrap();
        let uid = node.uid(UidGroup::PRIMARY).unwrap();
        assert_eq!(
            node.to_primitive(false).unwrap(),
            serde_json::json!({
                "nodeType": "Step",
                "inputs": { "input": "{Init_1.output}", "scale": 2.0 },
                "outputs": { "output": format!("cache/Step/{}/", uid) },
            })
        );

        let init = g.node("Init_1").unwrap().to_primitive(true).unwrap();
        assert_eq!(init["inputs"], serde_json::json!({ "image": "", "comment": "" }));
    }
}

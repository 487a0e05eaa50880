//! Node instances.
//!
//! A [`Node`] is one instance of a [`NodeDesc`]. It owns one [`Attribute`]
//! per declared descriptor, keyed by attribute name, in declaration order.
//! Nodes are created and owned by a [`Graph`](crate::graph::Graph); edges
//! between them live in the graph, never in the node.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::attribute::Attribute;
use crate::desc::NodeDesc;
use crate::error::CoreError;

/// A node in the pipeline graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    name: String,
    desc: Arc<NodeDesc>,
    attributes: IndexMap<String, Attribute>,
}

impl Node {
    /// Instantiates every declared attribute at its default.
    pub(crate) fn new(name: &str, desc: Arc<NodeDesc>) -> Self {
        let attributes = desc
            .attributes()
            .iter()
            .map(|d| (d.name().to_string(), Attribute::new(Arc::clone(d))))
            .collect();
        Node {
            name: name.to_string(),
            desc,
            attributes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_id(&self) -> &str {
        self.desc.type_id()
    }

    pub fn desc(&self) -> &Arc<NodeDesc> {
        &self.desc
    }

    /// The attribute for `key`. Fails with `UnknownAttribute` if the node
    /// type declares no such attribute.
    pub fn attribute(&self, key: &str) -> Result<&Attribute, CoreError> {
        self.attributes
            .get(key)
            .ok_or_else(|| self.unknown(key))
    }

    /// Mutable access is crate-private: the graph mediates writes so that a
    /// write to a linked input can drop the link first.
    pub(crate) fn attribute_mut(&mut self, key: &str) -> Result<&mut Attribute, CoreError> {
        let name = &self.name;
        self.attributes
            .get_mut(key)
            .ok_or_else(|| CoreError::UnknownAttribute {
                node: name.clone(),
                key: key.to_string(),
            })
    }

    /// All attributes in declaration order.
    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.values()
    }

    pub fn inputs(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.values().filter(|a| !a.is_output())
    }

    pub fn outputs(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.values().filter(|a| a.is_output())
    }

    fn unknown(&self, key: &str) -> CoreError {
        CoreError::UnknownAttribute {
            node: self.name.clone(),
            key: key.to_string(),
        }
    }
}

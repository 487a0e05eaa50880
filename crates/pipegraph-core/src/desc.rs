//! Static schema: attribute descriptors, node types, and the node catalog.
//!
//! Descriptors are immutable and shared (`Arc`) by every instance of a node
//! type. An [`AttributeDesc`] declares the attribute's name, kind, default,
//! and the fingerprint groups it contributes to. A [`NodeDesc`] is the
//! ordered list of input and output descriptors for one node type. The
//! [`NodeCatalog`] maps type ids to node descriptors.

use std::collections::BTreeSet;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::CoreError;
use crate::id::UidGroup;
use crate::value::{ScalarKind, Value};

/// The kind of an attribute, with its kind-specific schema.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeKind {
    /// A single value with a declared default.
    Scalar { kind: ScalarKind, default: Value },
    /// An ordered sequence of children sharing one element descriptor.
    /// The default is the empty list.
    List { element: Arc<AttributeDesc> },
    /// A fixed set of named children, in declaration order.
    Group { fields: Vec<Arc<AttributeDesc>> },
}

impl AttributeKind {
    /// Short name of the kind, used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            AttributeKind::Scalar { kind, .. } => kind.name(),
            AttributeKind::List { .. } => "list",
            AttributeKind::Group { .. } => "group",
        }
    }
}

/// Declaration of one attribute of a node type.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDesc {
    name: String,
    kind: AttributeKind,
    /// Sorted, deduplicated.
    groups: Vec<UidGroup>,
    is_output: bool,
}

impl AttributeDesc {
    /// Declares a scalar attribute. It belongs to no fingerprint group until
    /// [`in_group`](Self::in_group) is called.
    pub fn scalar(name: &str, kind: ScalarKind, default: impl Into<Value>) -> Self {
        let default = default.into();
        debug_assert!(
            kind.accept(default.clone()).as_ref() == Some(&default),
            "default of '{}' does not fit its kind",
            name
        );
        AttributeDesc {
            name: name.to_string(),
            kind: AttributeKind::Scalar { kind, default },
            groups: Vec::new(),
            is_output: false,
        }
    }

    pub fn bool(name: &str, default: bool) -> Self {
        Self::scalar(name, ScalarKind::Bool, default)
    }

    pub fn int(name: &str, default: i64) -> Self {
        Self::scalar(name, ScalarKind::Int, default)
    }

    pub fn float(name: &str, default: f64) -> Self {
        Self::scalar(name, ScalarKind::Float, default)
    }

    pub fn string(name: &str, default: &str) -> Self {
        Self::scalar(name, ScalarKind::String, default)
    }

    pub fn file(name: &str, default: &str) -> Self {
        Self::scalar(name, ScalarKind::File, default)
    }

    pub fn choice(name: &str, values: &[&str], default: &str) -> Self {
        let values = values.iter().map(|v| v.to_string()).collect();
        Self::scalar(name, ScalarKind::Choice { values }, default)
    }

    /// Declares a list attribute. Its groups are the element's groups.
    pub fn list(name: &str, element: AttributeDesc) -> Self {
        let groups = element.groups.clone();
        AttributeDesc {
            name: name.to_string(),
            kind: AttributeKind::List {
                element: Arc::new(element),
            },
            groups,
            is_output: false,
        }
    }

    /// Declares a group attribute. Its groups are the union of its fields'
    /// groups.
    pub fn group(name: &str, fields: Vec<AttributeDesc>) -> Self {
        let groups: BTreeSet<UidGroup> = fields
            .iter()
            .flat_map(|f| f.groups.iter().copied())
            .collect();
        AttributeDesc {
            name: name.to_string(),
            kind: AttributeKind::Group {
                fields: fields.into_iter().map(Arc::new).collect(),
            },
            groups: groups.into_iter().collect(),
            is_output: false,
        }
    }

    /// Declares an output attribute: a file path produced from `template`.
    ///
    /// The template may reference `{cache}`, `{nodeType}` and `{uidN}`.
    pub fn output(name: &str, template: &str) -> Self {
        AttributeDesc {
            is_output: true,
            ..Self::file(name, template)
        }
    }

    /// Adds this attribute (a scalar or an output) to a fingerprint group.
    ///
    /// List and group descriptors derive their groups from their children,
    /// so declare membership on the children instead.
    pub fn in_group(mut self, group: UidGroup) -> Self {
        debug_assert!(
            matches!(self.kind, AttributeKind::Scalar { .. }),
            "group membership of '{}' is derived from its children",
            self.name
        );
        if let Err(pos) = self.groups.binary_search(&group) {
            self.groups.insert(pos, group);
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &AttributeKind {
        &self.kind
    }

    pub fn is_output(&self) -> bool {
        self.is_output
    }

    /// The fingerprint groups this attribute contributes to, ascending.
    pub fn uid_groups(&self) -> &[UidGroup] {
        &self.groups
    }

    pub fn in_uid_group(&self, group: UidGroup) -> bool {
        self.groups.binary_search(&group).is_ok()
    }

    /// The default value of a scalar descriptor.
    pub fn default_value(&self) -> Option<&Value> {
        match &self.kind {
            AttributeKind::Scalar { default, .. } => Some(default),
            _ => None,
        }
    }

    /// The element descriptor of a list descriptor.
    pub fn element(&self) -> Option<&Arc<AttributeDesc>> {
        match &self.kind {
            AttributeKind::List { element } => Some(element),
            _ => None,
        }
    }

    /// A field descriptor of a group descriptor.
    pub fn field(&self, key: &str) -> Option<&Arc<AttributeDesc>> {
        match &self.kind {
            AttributeKind::Group { fields } => fields.iter().find(|f| f.name == key),
            _ => None,
        }
    }
}

/// The static schema of a node type.
///
/// Attribute declaration order (inputs first, then outputs) is the order of
/// the node's attribute mapping and of every fingerprint computed over it.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDesc {
    type_id: String,
    attributes: Vec<Arc<AttributeDesc>>,
}

impl NodeDesc {
    /// Creates a node type. Every descriptor in `outputs` is marked as an
    /// output.
    ///
    /// An output declaring no group depends on every group the inputs
    /// declare. Fails with [`CoreError::DuplicateAttribute`] if two
    /// descriptors, inputs and outputs alike, share a key.
    pub fn new(
        type_id: &str,
        inputs: Vec<AttributeDesc>,
        outputs: Vec<AttributeDesc>,
    ) -> Result<Self, CoreError> {
        let mut seen = BTreeSet::new();
        if let Some(dup) = inputs
            .iter()
            .chain(&outputs)
            .find(|a| !seen.insert(a.name.as_str()))
        {
            return Err(CoreError::DuplicateAttribute {
                type_id: type_id.to_string(),
                key: dup.name.clone(),
            });
        }

        let input_groups: Vec<UidGroup> = inputs
            .iter()
            .flat_map(|a| a.groups.iter().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let attributes = inputs
            .into_iter()
            .map(|a| AttributeDesc {
                is_output: false,
                ..a
            })
            .chain(outputs.into_iter().map(|a| {
                let groups = if a.groups.is_empty() {
                    input_groups.clone()
                } else {
                    a.groups
                };
                AttributeDesc {
                    is_output: true,
                    groups,
                    ..a
                }
            }))
            .map(Arc::new)
            .collect();

        Ok(NodeDesc {
            type_id: type_id.to_string(),
            attributes,
        })
    }

    pub fn type_id(&self) -> &str {
        &self.type_id
    }

    /// All attribute descriptors in declaration order.
    pub fn attributes(&self) -> &[Arc<AttributeDesc>] {
        &self.attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&Arc<AttributeDesc>> {
        self.attributes.iter().find(|a| a.name() == key)
    }

    pub fn inputs(&self) -> impl Iterator<Item = &Arc<AttributeDesc>> {
        self.attributes.iter().filter(|a| !a.is_output())
    }

    pub fn outputs(&self) -> impl Iterator<Item = &Arc<AttributeDesc>> {
        self.attributes.iter().filter(|a| a.is_output())
    }

    /// The inputs an output depends on: those sharing one of its groups.
    pub fn contributing_inputs(&self, output: &str) -> Vec<&Arc<AttributeDesc>> {
        let Some(out) = self.attribute(output).filter(|a| a.is_output()) else {
            return Vec::new();
        };
        self.inputs()
            .filter(|input| out.uid_groups().iter().any(|g| input.in_uid_group(*g)))
            .collect()
    }

    /// Union of the groups of all inputs, ascending.
    pub fn uid_groups(&self) -> Vec<UidGroup> {
        let groups: BTreeSet<UidGroup> = self
            .inputs()
            .flat_map(|a| a.uid_groups().iter().copied())
            .collect();
        groups.into_iter().collect()
    }
}

/// Registry of node types, keyed by type id, in registration order.
#[derive(Debug, Clone, Default)]
pub struct NodeCatalog {
    types: IndexMap<String, Arc<NodeDesc>>,
}

impl NodeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a node type.
    ///
    /// Returns [`CoreError::DuplicateNodeType`] if the type id is taken.
    pub fn register(&mut self, desc: NodeDesc) -> Result<Arc<NodeDesc>, CoreError> {
        if self.types.contains_key(desc.type_id()) {
            return Err(CoreError::DuplicateNodeType {
                type_id: desc.type_id().to_string(),
            });
        }
        let desc = Arc::new(desc);
        self.types
            .insert(desc.type_id().to_string(), Arc::clone(&desc));
        Ok(desc)
    }

    /// Looks up a node type by id.
    pub fn get(&self, type_id: &str) -> Result<&Arc<NodeDesc>, CoreError> {
        self.types
            .get(type_id)
            .ok_or_else(|| CoreError::NodeTypeNotFound {
                type_id: type_id.to_string(),
            })
    }

    pub fn type_ids(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

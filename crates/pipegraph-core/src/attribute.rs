//! Attribute instances: live values bound to a descriptor.
//!
//! An [`Attribute`] is owned by exactly one node, or by its parent attribute
//! when nested inside a list or group. Its value is one of the closed set of
//! [`AttributeValue`] shapes, and the shape always agrees with the
//! descriptor kind: [`Attribute::set_value`] is the only way to replace a
//! value and it checks the shape before touching anything.
//!
//! Whether an attribute is at its default is derived from the value every
//! time it is asked. There is no separate "is set" flag to fall out of sync.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::desc::{AttributeDesc, AttributeKind};
use crate::error::CoreError;
use crate::id::UidGroup;
use crate::uid::{self, Uid};
use crate::value::Value;

/// The current value of an attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Scalar(Value),
    List(Vec<Attribute>),
    Group(IndexMap<String, Attribute>),
}

/// A plain value tree accepted by [`Attribute::set_value`] and
/// [`Attribute::append`].
///
/// Deserializes from JSON: scalars, arrays and objects map to the three
/// variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Input {
    Scalar(Value),
    List(Vec<Input>),
    Group(IndexMap<String, Input>),
}

impl Input {
    fn shape_name(&self) -> &'static str {
        match self {
            Input::Scalar(v) => v.kind_name(),
            Input::List(_) => "list",
            Input::Group(_) => "group",
        }
    }
}

macro_rules! input_from_scalar {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Input {
                fn from(value: $ty) -> Self {
                    Input::Scalar(value.into())
                }
            }
        )*
    };
}

input_from_scalar!(Value, bool, i64, i32, f64, &str, String);

impl From<IndexMap<String, Value>> for Input {
    fn from(fields: IndexMap<String, Value>) -> Self {
        Input::Group(
            fields
                .into_iter()
                .map(|(k, v)| (k, Input::Scalar(v)))
                .collect(),
        )
    }
}

/// A live attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    desc: Arc<AttributeDesc>,
    value: AttributeValue,
}

impl Attribute {
    /// Instantiates an attribute at its default: scalars take the declared
    /// default, lists start empty, groups instantiate every field.
    pub fn new(desc: Arc<AttributeDesc>) -> Self {
        let value = match desc.kind() {
            AttributeKind::Scalar { default, .. } => AttributeValue::Scalar(default.clone()),
            AttributeKind::List { .. } => AttributeValue::List(Vec::new()),
            AttributeKind::Group { fields } => AttributeValue::Group(
                fields
                    .iter()
                    .map(|f| (f.name().to_string(), Attribute::new(Arc::clone(f))))
                    .collect(),
            ),
        };
        Attribute { desc, value }
    }

    pub fn desc(&self) -> &Arc<AttributeDesc> {
        &self.desc
    }

    pub fn name(&self) -> &str {
        self.desc.name()
    }

    pub fn is_output(&self) -> bool {
        self.desc.is_output()
    }

    pub fn value(&self) -> &AttributeValue {
        &self.value
    }

    /// The value of a scalar attribute, `None` for lists and groups.
    pub fn scalar(&self) -> Option<&Value> {
        match &self.value {
            AttributeValue::Scalar(v) => Some(v),
            _ => None,
        }
    }

    /// Structural comparison of the current value against the descriptor
    /// default. A list is default iff empty; a group iff every field is.
    pub fn is_default(&self) -> bool {
        match (&self.value, self.desc.kind()) {
            (AttributeValue::Scalar(v), AttributeKind::Scalar { default, .. }) => v == default,
            (AttributeValue::List(items), _) => items.is_empty(),
            (AttributeValue::Group(fields), _) => fields.values().all(Attribute::is_default),
            _ => false,
        }
    }

    /// Replaces the value.
    ///
    /// For groups, fields absent from the mapping keep their current value.
    /// Lists are rebuilt from scratch, each element starting at default.
    /// On error the attribute is left unchanged.
    pub fn set_value(&mut self, input: impl Into<Input>) -> Result<(), CoreError> {
        let value = self.build(input.into())?;
        self.value = value;
        Ok(())
    }

    /// Resets the attribute to its descriptor default.
    pub fn reset(&mut self) {
        *self = Attribute::new(Arc::clone(&self.desc));
    }

    fn build(&self, input: Input) -> Result<AttributeValue, CoreError> {
        match (self.desc.kind(), input) {
            (AttributeKind::Scalar { kind, .. }, Input::Scalar(v)) => {
                let found = v.kind_name();
                kind.accept(v)
                    .map(AttributeValue::Scalar)
                    .ok_or_else(|| self.mismatch(found))
            }
            (AttributeKind::List { element }, Input::List(items)) => {
                let mut children = Vec::with_capacity(items.len());
                for item in items {
                    let mut child = Attribute::new(Arc::clone(element));
                    child.set_value(item)?;
                    children.push(child);
                }
                Ok(AttributeValue::List(children))
            }
            (AttributeKind::Group { .. }, Input::Group(entries)) => {
                let AttributeValue::Group(current) = &self.value else {
                    return Err(self.mismatch("group"));
                };
                let mut fields = current.clone();
                for (key, entry) in entries {
                    let field = fields
                        .get_mut(&key)
                        .ok_or_else(|| CoreError::UnknownAttribute {
                            node: self.name().to_string(),
                            key: key.clone(),
                        })?;
                    field.set_value(entry)?;
                }
                Ok(AttributeValue::Group(fields))
            }
            (_, input) => Err(self.mismatch(input.shape_name())),
        }
    }

    fn mismatch(&self, found: &str) -> CoreError {
        CoreError::TypeMismatch {
            attribute: self.name().to_string(),
            expected: self.desc.kind().name().to_string(),
            found: found.to_string(),
        }
    }

    // -----------------------------------------------------------------------
    // List operations
    // -----------------------------------------------------------------------

    /// Number of children: list elements or group fields. Zero for scalars.
    pub fn len(&self) -> usize {
        match &self.value {
            AttributeValue::Scalar(_) => 0,
            AttributeValue::List(items) => items.len(),
            AttributeValue::Group(fields) => fields.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The list element at `index`.
    pub fn element(&self, index: usize) -> Result<&Attribute, CoreError> {
        let AttributeValue::List(items) = &self.value else {
            return Err(self.mismatch_expecting("list"));
        };
        let len = items.len();
        items.get(index).ok_or_else(|| CoreError::IndexOutOfRange {
            attribute: self.name().to_string(),
            index,
            len,
        })
    }

    pub fn element_mut(&mut self, index: usize) -> Result<&mut Attribute, CoreError> {
        let name = self.name().to_string();
        let found = self.value_shape();
        let AttributeValue::List(items) = &mut self.value else {
            return Err(CoreError::TypeMismatch {
                attribute: name,
                expected: "list".into(),
                found: found.into(),
            });
        };
        let len = items.len();
        items.get_mut(index).ok_or(CoreError::IndexOutOfRange {
            attribute: name,
            index,
            len,
        })
    }

    /// Appends a fresh element built from the element descriptor.
    ///
    /// Every field starts at its default except those supplied in `input`.
    pub fn append(&mut self, input: impl Into<Input>) -> Result<&mut Attribute, CoreError> {
        let Some(element) = self.desc.element().cloned() else {
            return Err(self.mismatch_expecting("list"));
        };
        let mut child = Attribute::new(element);
        child.set_value(input)?;
        match self.value {
            AttributeValue::List(ref mut items) => {
                items.push(child);
                let last = items.len() - 1;
                Ok(&mut items[last])
            }
            _ => Err(self.mismatch_expecting("list")),
        }
    }

    /// Removes and returns the element at `index`.
    pub fn remove(&mut self, index: usize) -> Result<Attribute, CoreError> {
        self.element(index)?;
        match &mut self.value {
            AttributeValue::List(items) => Ok(items.remove(index)),
            _ => Err(self.mismatch_expecting("list")),
        }
    }

    /// Removes every element of a list.
    pub fn clear(&mut self) -> Result<(), CoreError> {
        match &mut self.value {
            AttributeValue::List(items) => {
                items.clear();
                Ok(())
            }
            _ => Err(self.mismatch_expecting("list")),
        }
    }

    // -----------------------------------------------------------------------
    // Group operations
    // -----------------------------------------------------------------------

    /// The group field named `key`.
    pub fn field(&self, key: &str) -> Result<&Attribute, CoreError> {
        let AttributeValue::Group(fields) = &self.value else {
            return Err(self.mismatch_expecting("group"));
        };
        fields.get(key).ok_or_else(|| CoreError::UnknownAttribute {
            node: self.name().to_string(),
            key: key.to_string(),
        })
    }

    pub fn field_mut(&mut self, key: &str) -> Result<&mut Attribute, CoreError> {
        let name = self.name().to_string();
        let found = self.value_shape();
        let AttributeValue::Group(fields) = &mut self.value else {
            return Err(CoreError::TypeMismatch {
                attribute: name,
                expected: "group".into(),
                found: found.into(),
            });
        };
        fields.get_mut(key).ok_or(CoreError::UnknownAttribute {
            node: name,
            key: key.to_string(),
        })
    }

    /// Children in order: list elements or group fields.
    pub fn children(&self) -> Box<dyn Iterator<Item = &Attribute> + '_> {
        match &self.value {
            AttributeValue::Scalar(_) => Box::new(std::iter::empty()),
            AttributeValue::List(items) => Box::new(items.iter()),
            AttributeValue::Group(fields) => Box::new(fields.values()),
        }
    }

    fn value_shape(&self) -> &'static str {
        match &self.value {
            AttributeValue::Scalar(v) => v.kind_name(),
            AttributeValue::List(_) => "list",
            AttributeValue::Group(_) => "group",
        }
    }

    fn mismatch_expecting(&self, expected: &str) -> CoreError {
        CoreError::TypeMismatch {
            attribute: self.name().to_string(),
            expected: expected.to_string(),
            found: self.value_shape().to_string(),
        }
    }

    // -----------------------------------------------------------------------
    // Projection and fingerprinting
    // -----------------------------------------------------------------------

    /// Projects the value tree into plain JSON.
    ///
    /// With `export_default == false`, group fields at their default are
    /// omitted. List elements are never omitted, even when every one of
    /// their fields is default: they exist because they were appended.
    pub fn to_primitive(&self, export_default: bool) -> serde_json::Value {
        match &self.value {
            AttributeValue::Scalar(v) => v.to_json(),
            AttributeValue::List(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(|item| item.to_primitive(export_default))
                    .collect(),
            ),
            AttributeValue::Group(fields) => serde_json::Value::Object(
                fields
                    .iter()
                    .filter(|(_, f)| export_default || !f.is_default())
                    .map(|(k, f)| (k.clone(), f.to_primitive(export_default)))
                    .collect(),
            ),
        }
    }

    /// Fingerprint of this attribute's own value, ignoring any edge bound to
    /// it. `None` covers every group the descriptor declares.
    ///
    /// Graph-aware fingerprints (which follow edges) go through
    /// [`AttributeRef::uid`](crate::view::AttributeRef::uid).
    pub fn local_uid(&self, group: Option<UidGroup>) -> Uid {
        uid::attribute_uid(self, group)
    }
}

//! Core error types for pipegraph-core.
//!
//! Uses `thiserror` for structured, matchable error variants. Every failure
//! in the core is a deterministic function of its input and is reported
//! synchronously to the caller; nothing here is retried.

use thiserror::Error;

/// Core errors produced by the pipegraph-core crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A value's shape or scalar kind disagrees with the attribute descriptor.
    #[error("type mismatch on attribute '{attribute}': expected {expected}, found {found}")]
    TypeMismatch {
        attribute: String,
        expected: String,
        found: String,
    },

    /// An attribute key is not declared by the node type (or group).
    #[error("unknown attribute '{key}' on '{node}'")]
    UnknownAttribute { node: String, key: String },

    /// No node with the given name (or node type) exists in the graph.
    #[error("node not found: '{name}'")]
    NodeNotFound { name: String },

    /// The node catalog has no descriptor for the given type id.
    #[error("node type not found: '{type_id}'")]
    NodeTypeNotFound { type_id: String },

    /// A node type id is already registered in the catalog.
    #[error("duplicate node type: '{type_id}'")]
    DuplicateNodeType { type_id: String },

    /// A node type declares the same attribute key twice.
    #[error("duplicate attribute '{key}' in node type '{type_id}'")]
    DuplicateAttribute { type_id: String, key: String },

    /// A node name is already taken in the graph.
    #[error("duplicate node name: '{name}'")]
    DuplicateNodeName { name: String },

    /// An edge binding failed validation.
    #[error("invalid edge: {reason}")]
    InvalidEdge { reason: String },

    /// A cycle was observed in the graph. This is an invariant violation.
    #[error("cyclic graph: cycle through node '{node}'")]
    CyclicGraph { node: String },

    /// A list element index is past the end of the list.
    #[error("index {index} out of range on attribute '{attribute}' (len {len})")]
    IndexOutOfRange {
        attribute: String,
        index: usize,
        len: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_context() {
        let err = CoreError::TypeMismatch {
            attribute: "intrinsicId".into(),
            expected: "int".into(),
            found: "string".into(),
        };
        assert_eq!(
            err.to_string(),
            "type mismatch on attribute 'intrinsicId': expected int, found string"
        );

        let err = CoreError::NodeNotFound {
            name: "CameraInit_1".into(),
        };
        assert_eq!(err.to_string(), "node not found: 'CameraInit_1'");
    }
}

pub mod value;
pub mod id;
pub mod error;
pub mod desc;
pub mod attribute;
pub mod node;
pub mod edge;
pub mod config;
pub mod uid;
pub mod graph;
pub mod traverse;
pub mod view;
pub mod equivalence;

// Re-export commonly used types
pub use value::{Value, ScalarKind};
pub use id::{NodeId, EdgeId, UidGroup};
pub use error::CoreError;
pub use desc::{AttributeDesc, AttributeKind, NodeDesc, NodeCatalog};
pub use attribute::{Attribute, AttributeValue, Input};
pub use node::Node;
pub use edge::{Edge, EdgeRecord};
pub use config::GraphConfig;
pub use uid::{Fingerprinter, Uid};
pub use graph::Graph;
pub use traverse::Traversal;
pub use view::{AttributeRef, NodeRef};
pub use equivalence::Mismatch;

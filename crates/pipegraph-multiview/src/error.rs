//! Pipeline builder errors.

use pipegraph_core::CoreError;
use thiserror::Error;

/// Errors produced while assembling a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// A graph operation failed: unknown field, wrong value kind, ...
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A viewpoint record does not name its image.
    #[error("viewpoint record {index} has no 'image' field")]
    MissingImage { index: usize },
}

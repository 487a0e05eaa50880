//! Cache error types for pipegraph-cache.

use pipegraph_core::CoreError;
use thiserror::Error;

/// Errors produced while snapshotting or comparing fingerprints.
#[derive(Debug, Error)]
pub enum CacheError {
    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Reading or writing a snapshot file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Fingerprinting the graph failed.
    #[error(transparent)]
    Core(#[from] CoreError),
}

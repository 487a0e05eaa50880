//! Graph configuration.

use serde::{Deserialize, Serialize};

/// Settings that affect where outputs land on disk but never what they
/// fingerprint to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Root substituted for `{cache}` in output path templates.
    pub cache_dir: String,
}

impl GraphConfig {
    pub fn with_cache_dir(cache_dir: impl Into<String>) -> Self {
        GraphConfig {
            cache_dir: cache_dir.into(),
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        GraphConfig {
            cache_dir: "cache".to_string(),
        }
    }
}

use std::path::Path;

use serde::{Deserialize, Serialize};

use redline_merge::MergeConfig;
use redline_workflow::WorkflowConfig;

use crate::error::{SdkError, SdkResult};

/// Configuration for a [`CoreEngine`](crate::CoreEngine).
///
/// Every field has a default, so an empty TOML file is a valid config:
///
/// ```toml
/// diff_cache_capacity = 128
///
/// [merge]
/// preserve_deletions = true
///
/// [workflow]
/// enforce_roles = false
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of cached diffs; 0 disables the cache.
    pub diff_cache_capacity: usize,
    pub merge: MergeConfig,
    pub workflow: WorkflowConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            diff_cache_capacity: 64,
            merge: MergeConfig::default(),
            workflow: WorkflowConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> SdkResult<Self> {
        toml::from_str(s).map_err(|e| SdkError::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> SdkResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SdkError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> SdkResult<String> {
        toml::to_string(self).map_err(|e| SdkError::Config(e.to_string()))
    }
}

use serde::{Deserialize, Serialize};

/// Policy knobs for the merge engine.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// When `false` (the default) a deletion on one side is applied silently.
    /// When `true` every such deletion becomes a conflict that has to be
    /// confirmed or rejected explicitly.
    pub preserve_deletions: bool,
}

impl MergeConfig {
    /// Configuration that surfaces every deletion as a conflict.
    pub fn preserving_deletions() -> Self {
        Self {
            preserve_deletions: true,
        }
    }
}

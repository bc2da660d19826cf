use serde::{Deserialize, Serialize};

/// Workflow policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Restrict review events to assigned reviewers and lifecycle events
    /// (submit, merge, archive) to the initiator.
    pub enforce_roles: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            enforce_roles: true,
        }
    }
}

impl WorkflowConfig {
    /// Any actor may send any event.
    pub fn permissive() -> Self {
        Self {
            enforce_roles: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_are_enforced_by_default() {
        assert!(WorkflowConfig::default().enforce_roles);
        assert!(!WorkflowConfig::permissive().enforce_roles);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: WorkflowConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, WorkflowConfig::default());
    }
}

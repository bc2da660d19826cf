//! Workflow statuses, events and the transition table.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Pending,
    InReview,
    ChangesRequested,
    Approved,
    Rejected,
    Merged,
    Archived,
}

impl WorkflowStatus {
    pub const ALL: [WorkflowStatus; 7] = [
        Self::Pending,
        Self::InReview,
        Self::ChangesRequested,
        Self::Approved,
        Self::Rejected,
        Self::Merged,
        Self::Archived,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InReview => "in_review",
            Self::ChangesRequested => "changes_requested",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Merged => "merged",
            Self::Archived => "archived",
        }
    }

    /// No event is legal from a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Archived)
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowEvent {
    SubmitForReview,
    Approve,
    RequestChanges,
    Reject,
    Merge,
    Archive,
}

impl WorkflowEvent {
    pub const ALL: [WorkflowEvent; 6] = [
        Self::SubmitForReview,
        Self::Approve,
        Self::RequestChanges,
        Self::Reject,
        Self::Merge,
        Self::Archive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SubmitForReview => "submit_for_review",
            Self::Approve => "approve",
            Self::RequestChanges => "request_changes",
            Self::Reject => "reject",
            Self::Merge => "merge",
            Self::Archive => "archive",
        }
    }

    /// Events only an assigned reviewer may send.
    pub fn is_review_event(&self) -> bool {
        matches!(self, Self::Approve | Self::RequestChanges | Self::Reject)
    }
}

impl fmt::Display for WorkflowEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WorkflowEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| format!("unknown workflow event: {s}"))
    }
}

/// Status reached by `event` from `status`, or `None` if the event is
/// illegal there.
///
/// For `approve` this is the status once quorum is complete; a partial
/// approval stays in `in_review`.
pub fn transition(status: WorkflowStatus, event: WorkflowEvent) -> Option<WorkflowStatus> {
    use WorkflowEvent as E;
    use WorkflowStatus as S;

    match (status, event) {
        (S::Pending, E::SubmitForReview) => Some(S::InReview),
        (S::InReview, E::Approve) => Some(S::Approved),
        (S::InReview, E::RequestChanges) => Some(S::ChangesRequested),
        (S::InReview, E::Reject) => Some(S::Rejected),
        (S::ChangesRequested, E::SubmitForReview) => Some(S::InReview),
        (S::ChangesRequested, E::Reject) => Some(S::Rejected),
        (S::Approved, E::Merge) => Some(S::Merged),
        (S::Approved, E::Reject) => Some(S::Rejected),
        (S::Rejected, E::SubmitForReview) => Some(S::InReview),
        (S::Merged, E::Archive) => Some(S::Archived),
        _ => None,
    }
}

/// Events legal in `status`, in table order.
pub fn legal_events(status: WorkflowStatus) -> Vec<WorkflowEvent> {
    WorkflowEvent::ALL
        .into_iter()
        .filter(|&e| transition(status, e).is_some())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_only_accepts_submission() {
        assert_eq!(
            legal_events(WorkflowStatus::Pending),
            vec![WorkflowEvent::SubmitForReview]
        );
    }

    #[test]
    fn archived_is_terminal() {
        assert!(WorkflowStatus::Archived.is_terminal());
        assert!(legal_events(WorkflowStatus::Archived).is_empty());
    }

    #[test]
    fn table_has_ten_transitions() {
        let count: usize = WorkflowStatus::ALL
            .iter()
            .map(|&s| legal_events(s).len())
            .sum();
        assert_eq!(count, 10);
    }

    #[test]
    fn approved_can_merge_or_reject() {
        assert_eq!(
            legal_events(WorkflowStatus::Approved),
            vec![WorkflowEvent::Reject, WorkflowEvent::Merge]
        );
        assert_eq!(
            transition(WorkflowStatus::Approved, WorkflowEvent::Merge),
            Some(WorkflowStatus::Merged)
        );
    }

    #[test]
    fn wire_names_are_snake_case() {
        assert_eq!(
            serde_json::to_string(&WorkflowStatus::ChangesRequested).unwrap(),
            "\"changes_requested\""
        );
        assert_eq!(
            serde_json::to_string(&WorkflowEvent::SubmitForReview).unwrap(),
            "\"submit_for_review\""
        );
        assert_eq!(
            "request_changes".parse::<WorkflowEvent>(),
            Ok(WorkflowEvent::RequestChanges)
        );
        assert!("approve!".parse::<WorkflowEvent>().is_err());
    }
}

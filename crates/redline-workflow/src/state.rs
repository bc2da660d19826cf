use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::WorkflowConfig;
use crate::error::{Result, WorkflowError};
use crate::status::{transition, WorkflowEvent, WorkflowStatus};

/// One recorded event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowEventRecord {
    /// 1-based position in the history.
    pub seq: u64,
    pub event: WorkflowEvent,
    pub actor: String,
    pub from_status: WorkflowStatus,
    pub to_status: WorkflowStatus,
    pub at: DateTime<Utc>,
}

/// Result of applying an event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventOutcome {
    Recorded(WorkflowEventRecord),
    /// A repeated approval by the same reviewer; nothing was recorded.
    AlreadyApproved,
}

/// Review lifecycle of one document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub id: Uuid,
    pub document_id: Uuid,
    pub status: WorkflowStatus,
    pub initiator_id: String,
    /// Fixed at creation.
    pub reviewer_ids: BTreeSet<String>,
    /// Reviewers who approved in the current review round.
    pub approver_ids: BTreeSet<String>,
    pub event_history: Vec<WorkflowEventRecord>,
    /// Incremented on every recorded event.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowState {
    /// Open a workflow in `pending`.
    pub fn new<I, S>(document_id: Uuid, initiator_id: impl Into<String>, reviewers: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let reviewer_ids: BTreeSet<String> = reviewers.into_iter().map(Into::into).collect();
        if reviewer_ids.is_empty() {
            return Err(WorkflowError::NoReviewers);
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::now_v7(),
            document_id,
            status: WorkflowStatus::Pending,
            initiator_id: initiator_id.into(),
            reviewer_ids,
            approver_ids: BTreeSet::new(),
            event_history: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Whether every assigned reviewer has approved.
    pub fn has_quorum(&self) -> bool {
        self.approver_ids.is_superset(&self.reviewer_ids)
    }

    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Apply `event` sent by `actor`. On error the state is unchanged.
    pub fn apply(
        &mut self,
        event: WorkflowEvent,
        actor: &str,
        config: &WorkflowConfig,
    ) -> Result<EventOutcome> {
        match self.decide(event, actor, config)? {
            None => Ok(EventOutcome::AlreadyApproved),
            Some(to) => Ok(EventOutcome::Recorded(self.record(event, actor, to, Utc::now()))),
        }
    }

    /// Decide the status `event` leads to without changing anything.
    /// `None` means a repeated approval.
    pub(crate) fn decide(
        &self,
        event: WorkflowEvent,
        actor: &str,
        config: &WorkflowConfig,
    ) -> Result<Option<WorkflowStatus>> {
        // Re-approval stays a no-op once the quorum has moved the status on.
        if event == WorkflowEvent::Approve
            && matches!(self.status, WorkflowStatus::InReview | WorkflowStatus::Approved)
            && self.approver_ids.contains(actor)
        {
            return Ok(None);
        }

        let target = transition(self.status, event).ok_or(WorkflowError::IllegalTransition {
            status: self.status,
            event,
        })?;

        if config.enforce_roles {
            let permitted = if event.is_review_event() {
                self.reviewer_ids.contains(actor)
            } else {
                self.initiator_id == actor
            };
            if !permitted {
                return Err(WorkflowError::ActorNotPermitted {
                    actor: actor.to_string(),
                    event,
                });
            }
        }

        if event != WorkflowEvent::Approve {
            return Ok(Some(target));
        }
        let quorum = self
            .reviewer_ids
            .iter()
            .all(|r| r == actor || self.approver_ids.contains(r));
        Ok(Some(if quorum { target } else { WorkflowStatus::InReview }))
    }

    /// Append a decided event and move to `to`.
    pub(crate) fn record(
        &mut self,
        event: WorkflowEvent,
        actor: &str,
        to: WorkflowStatus,
        at: DateTime<Utc>,
    ) -> WorkflowEventRecord {
        let from = self.status;
        if event == WorkflowEvent::Approve {
            self.approver_ids.insert(actor.to_string());
        }
        if to == WorkflowStatus::InReview && from != WorkflowStatus::InReview {
            self.approver_ids.clear();
        }

        let record = WorkflowEventRecord {
            seq: self.event_history.len() as u64 + 1,
            event,
            actor: actor.to_string(),
            from_status: from,
            to_status: to,
            at,
        };
        self.event_history.push(record.clone());
        self.status = to;
        self.version += 1;
        self.updated_at = at;
        record
    }
}

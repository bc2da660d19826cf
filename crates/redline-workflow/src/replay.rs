//! Rebuild a workflow from its event history.

use crate::config::WorkflowConfig;
use crate::error::{Result, WorkflowError};
use crate::state::{WorkflowEventRecord, WorkflowState};

/// Re-apply `records` on top of `initial`.
///
/// Every record is decided again against the state built so far, without
/// role checks. A sequence gap, a status that does not match, an illegal
/// event, or a recorded repeat approval rejects the whole history.
pub fn replay(initial: WorkflowState, records: &[WorkflowEventRecord]) -> Result<WorkflowState> {
    let config = WorkflowConfig::permissive();
    let mut state = initial;

    for record in records {
        let expected_seq = state.event_history.len() as u64 + 1;
        if record.seq != expected_seq {
            return Err(WorkflowError::InvalidHistory(format!(
                "expected seq {expected_seq}, found {}",
                record.seq
            )));
        }
        if record.from_status != state.status {
            return Err(WorkflowError::InvalidHistory(format!(
                "seq {} starts from {}, state is {}",
                record.seq, record.from_status, state.status
            )));
        }

        let to = state
            .decide(record.event, &record.actor, &config)?
            .ok_or_else(|| {
                WorkflowError::InvalidHistory(format!(
                    "seq {} records a repeated approval by {}",
                    record.seq, record.actor
                ))
            })?;
        if to != record.to_status {
            return Err(WorkflowError::InvalidHistory(format!(
                "seq {} leads to {to}, recorded {}",
                record.seq, record.to_status
            )));
        }
        state.record(record.event, &record.actor, to, record.at);
    }
    Ok(state)
}

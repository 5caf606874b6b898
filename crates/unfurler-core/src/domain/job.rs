//! Job record and state transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::handler_name::HandlerName;
use super::ids::{ClaimToken, TriggerId};

/// Job state.
///
/// State transitions:
/// - Waiting -> Running -> Done
/// - Waiting -> Running -> Failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Trigger registered, not yet claimed by a firing.
    Waiting,

    /// Claimed by a firing; the handler is executing.
    Running,

    /// Handler returned normally.
    Done,

    /// Handler returned an error.
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }

    /// Only waiting jobs can be claimed or cancelled.
    pub fn is_claimable(self) -> bool {
        matches!(self, JobState::Waiting)
    }
}

/// A unit of deferred work as persisted in the property store.
///
/// Design:
/// - `id` equals the trigger id, so one record maps to exactly one scheduled firing.
/// - `parameter` is kept as an encoded string; the broker never looks inside it.
/// - State transitions happen through methods, not direct field writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: TriggerId,
    pub handler: HandlerName,
    pub parameter: String,
    pub state: JobState,
    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,

    /// Written together with `Running`; the read-back check compares against it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim: Option<ClaimToken>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl JobRecord {
    pub fn waiting(
        id: TriggerId,
        handler: HandlerName,
        parameter: String,
        created_at: DateTime<Utc>,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            handler,
            parameter,
            state: JobState::Waiting,
            created_at,
            scheduled_at,
            claim: None,
            last_error: None,
        }
    }

    /// Key used to order concurrent candidates: first-scheduled, first-served.
    pub fn dispatch_order(&self) -> (DateTime<Utc>, DateTime<Utc>, TriggerId) {
        (
            self.scheduled_at.unwrap_or(self.created_at),
            self.created_at,
            self.id,
        )
    }

    /// Has the intended firing time been reached?
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_at.is_none_or(|at| at <= now)
    }

    pub fn start(&mut self, claim: ClaimToken) {
        self.state = JobState::Running;
        self.claim = Some(claim);
    }

    pub fn mark_done(&mut self) {
        self.state = JobState::Done;
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.state = JobState::Failed;
        self.last_error = Some(error.into());
    }

    pub fn is_claimed_by(&self, claim: ClaimToken) -> bool {
        self.state == JobState::Running && self.claim == Some(claim)
    }
}

//! Job domain types for generation requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::{ArtifactRef, Prompt};

/// Unique identifier for a job, using ULID so ids sort by submission time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Ulid);

impl JobId {
    /// Create a new unique job ID.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parse a job ID from a string.
    pub fn parse(s: &str) -> Result<Self, ulid::DecodeError> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Current status of a job in its lifecycle.
///
/// Transitions only move forward: `Pending -> Running -> Completed | Failed`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting in the admission queue.
    #[default]
    Pending,
    /// Claimed by the dispatcher; the provider call is in flight.
    Running,
    /// Generation produced at least one stored artifact.
    Completed { artifacts: Vec<ArtifactRef> },
    /// Generation failed; `error` records the cause.
    Failed { error: String },
}

impl JobStatus {
    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed { .. } | JobStatus::Failed { .. })
    }

    /// Whether moving from this status to `next` is a legal forward transition.
    pub fn can_transition_to(&self, next: &JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Completed { .. })
                | (JobStatus::Running, JobStatus::Failed { .. })
        )
    }

    /// Get a simple status string for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed { .. } => "completed",
            JobStatus::Failed { .. } => "failed",
        }
    }
}

/// One request's worth of generation work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// Prompt supplied at submission; never changes afterwards.
    pub prompt: Prompt,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    /// When the dispatcher claimed the job.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a new pending job.
    pub fn new(id: JobId, prompt: Prompt) -> Self {
        Self {
            id,
            prompt,
            status: JobStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Milliseconds spent waiting in the queue, once claimed.
    pub fn queue_wait_ms(&self) -> Option<u64> {
        self.started_at
            .map(|started| millis_between(self.created_at, started))
    }

    /// Milliseconds spent generating, once terminal.
    pub fn run_duration_ms(&self) -> Option<u64> {
        match (self.started_at, self.completed_at) {
            (Some(started), Some(completed)) => Some(millis_between(started, completed)),
            _ => None,
        }
    }
}

fn millis_between(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    (to - from).num_milliseconds().max(0) as u64
}

/// What a client sees when polling a job.
///
/// `Pending` covers both "queued" and "generating"; callers never need to
/// tell them apart. `NotFound` is returned for unknown ids and for results
/// that were already consumed by an earlier poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PollOutcome {
    Pending,
    Completed { artifacts: Vec<ArtifactRef> },
    Failed { error: String },
    NotFound,
}

impl PollOutcome {
    /// Map a job's status to the client-facing outcome.
    pub fn from_status(status: &JobStatus) -> Self {
        match status {
            JobStatus::Pending | JobStatus::Running => PollOutcome::Pending,
            JobStatus::Completed { artifacts } => PollOutcome::Completed {
                artifacts: artifacts.clone(),
            },
            JobStatus::Failed { error } => PollOutcome::Failed {
                error: error.clone(),
            },
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PollOutcome::Completed { .. } | PollOutcome::Failed { .. })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;

    fn completed() -> JobStatus {
        JobStatus::Completed {
            artifacts: vec![ArtifactRef::new("image_a.png")],
        }
    }

    fn failed() -> JobStatus {
        JobStatus::Failed {
            error: "transport: connection reset".into(),
        }
    }

    #[test]
    fn only_forward_transitions_are_legal() {
        assert!(JobStatus::Pending.can_transition_to(&JobStatus::Running));
        assert!(JobStatus::Running.can_transition_to(&completed()));
        assert!(JobStatus::Running.can_transition_to(&failed()));

        assert!(!JobStatus::Pending.can_transition_to(&completed()));
        assert!(!JobStatus::Running.can_transition_to(&JobStatus::Pending));
        assert!(!completed().can_transition_to(&JobStatus::Running));
        assert!(!failed().can_transition_to(&JobStatus::Pending));
        assert!(!completed().can_transition_to(&failed()));
    }

    #[test]
    fn running_and_pending_both_poll_as_pending() {
        assert_eq!(PollOutcome::from_status(&JobStatus::Pending), PollOutcome::Pending);
        assert_eq!(PollOutcome::from_status(&JobStatus::Running), PollOutcome::Pending);
        assert!(PollOutcome::from_status(&failed()).is_terminal());
    }

    #[test]
    fn job_id_round_trips_through_its_string_form() {
        let id = JobId::new();
        let parsed = JobId::parse(&id.to_string()).expect("valid ulid");
        assert_eq!(id, parsed);
        assert!(JobId::parse("not-a-ulid").is_err());
    }

    #[test]
    fn status_serializes_with_a_tag() {
        let json = serde_json::to_value(completed()).expect("serialize");
        assert_eq!(json["status"], "completed");
        assert_eq!(json["artifacts"][0], "image_a.png");
    }
}

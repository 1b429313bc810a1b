//! Event types emitted as jobs move through the queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::JobId;

/// Events emitted by the generation queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    /// A job was admitted to the queue.
    JobSubmitted {
        job_id: JobId,
        timestamp: DateTime<Utc>,
    },
    /// The dispatcher claimed a job and called the provider.
    JobStarted {
        job_id: JobId,
        queue_wait_ms: u64,
        timestamp: DateTime<Utc>,
    },
    /// A job completed with stored artifacts.
    JobCompleted {
        job_id: JobId,
        artifacts: usize,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    /// A job failed.
    JobFailed {
        job_id: JobId,
        error: String,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    /// A terminal result was handed to a client and removed.
    JobConsumed {
        job_id: JobId,
        timestamp: DateTime<Utc>,
    },
    /// A terminal result nobody read was purged.
    JobExpired {
        job_id: JobId,
        timestamp: DateTime<Utc>,
    },
}

impl JobEvent {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            JobEvent::JobSubmitted { timestamp, .. }
            | JobEvent::JobStarted { timestamp, .. }
            | JobEvent::JobCompleted { timestamp, .. }
            | JobEvent::JobFailed { timestamp, .. }
            | JobEvent::JobConsumed { timestamp, .. }
            | JobEvent::JobExpired { timestamp, .. } => *timestamp,
        }
    }

    /// Get the job ID this event is about.
    pub fn job_id(&self) -> JobId {
        match self {
            JobEvent::JobSubmitted { job_id, .. }
            | JobEvent::JobStarted { job_id, .. }
            | JobEvent::JobCompleted { job_id, .. }
            | JobEvent::JobFailed { job_id, .. }
            | JobEvent::JobConsumed { job_id, .. }
            | JobEvent::JobExpired { job_id, .. } => *job_id,
        }
    }

    /// Whether this event records a job reaching a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobEvent::JobCompleted { .. } | JobEvent::JobFailed { .. }
        )
    }

    /// Get a short description of this event for logging.
    pub fn description(&self) -> String {
        match self {
            JobEvent::JobSubmitted { job_id, .. } => format!("Job {} submitted", job_id),
            JobEvent::JobStarted {
                job_id,
                queue_wait_ms,
                ..
            } => format!("Job {} started after {}ms in queue", job_id, queue_wait_ms),
            JobEvent::JobCompleted {
                job_id,
                artifacts,
                duration_ms,
                ..
            } => format!(
                "Job {} completed with {} artifacts in {}ms",
                job_id, artifacts, duration_ms
            ),
            JobEvent::JobFailed { job_id, error, .. } => {
                format!("Job {} failed: {}", job_id, error)
            }
            JobEvent::JobConsumed { job_id, .. } => format!("Job {} result consumed", job_id),
            JobEvent::JobExpired { job_id, .. } => format!("Job {} result expired", job_id),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;

    #[test]
    fn only_completion_and_failure_are_terminal() {
        let job_id = JobId::new();
        let now = Utc::now();
        let failed = JobEvent::JobFailed {
            job_id,
            error: "quota exceeded: slow down".into(),
            duration_ms: 12,
            timestamp: now,
        };
        assert!(failed.is_terminal());
        assert_eq!(failed.job_id(), job_id);
        assert!(failed.description().contains("quota exceeded"));

        let consumed = JobEvent::JobConsumed {
            job_id,
            timestamp: now,
        };
        assert!(!consumed.is_terminal());
        assert_eq!(consumed.timestamp(), now);
    }

    #[test]
    fn events_serialize_with_an_event_tag() {
        let event = JobEvent::JobSubmitted {
            job_id: JobId::new(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["event"], "job_submitted");
    }
}

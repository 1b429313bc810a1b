//! In-memory job store: the single source of truth for job state.
//!
//! Every operation takes the store lock once, so readers never observe a
//! half-applied transition. The lock is never held across an `.await`.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use gen_core::{ArtifactRef, Job, JobId, JobStatus, Prompt, QueueStats};

/// Errors from job store operations.
///
/// Apart from `NotFound`, these signal a broken structural guarantee rather
/// than an expected runtime condition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("job {0} already exists")]
    DuplicateId(JobId),

    #[error("job {0} not found")]
    NotFound(JobId),

    #[error("job {id}: invalid transition {from} -> {to}")]
    InvalidTransition {
        id: JobId,
        from: &'static str,
        to: &'static str,
    },

    #[error("job {id} cannot start while job {running} is running")]
    AlreadyRunning { id: JobId, running: JobId },

    #[error("job {0} cannot complete without artifacts")]
    EmptyArtifacts(JobId),
}

#[derive(Default)]
struct StoreInner {
    jobs: HashMap<JobId, Job>,
    running: Option<JobId>,
    completed_total: u64,
    failed_total: u64,
}

/// Thread-safe job records keyed by id.
#[derive(Default)]
pub struct JobStore {
    inner: Mutex<StoreInner>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a new pending job.
    pub fn create(&self, id: JobId, prompt: Prompt) -> Result<Job, StoreError> {
        let mut inner = self.lock();
        if inner.jobs.contains_key(&id) {
            return Err(StoreError::DuplicateId(id));
        }
        let job = Job::new(id, prompt);
        inner.jobs.insert(id, job.clone());
        Ok(job)
    }

    /// Get a copy of a job record.
    pub fn get(&self, id: JobId) -> Result<Job, StoreError> {
        self.lock()
            .jobs
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    /// Move a pending job to running. At most one job may be running.
    pub fn transition_to_running(&self, id: JobId) -> Result<Job, StoreError> {
        let mut inner = self.lock();
        let StoreInner { jobs, running, .. } = &mut *inner;

        let job = jobs.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if !job.status.can_transition_to(&JobStatus::Running) {
            return Err(StoreError::InvalidTransition {
                id,
                from: job.status.as_str(),
                to: JobStatus::Running.as_str(),
            });
        }
        if let Some(current) = *running {
            return Err(StoreError::AlreadyRunning {
                id,
                running: current,
            });
        }

        job.status = JobStatus::Running;
        job.started_at = Some(Utc::now());
        *running = Some(id);
        Ok(job.clone())
    }

    /// Record a successful generation. Requires at least one artifact.
    pub fn complete_success(
        &self,
        id: JobId,
        artifacts: Vec<ArtifactRef>,
    ) -> Result<Job, StoreError> {
        if artifacts.is_empty() {
            return Err(StoreError::EmptyArtifacts(id));
        }
        self.finish(id, JobStatus::Completed { artifacts })
    }

    /// Record a failed generation.
    pub fn complete_failure(&self, id: JobId, error: impl Into<String>) -> Result<Job, StoreError> {
        self.finish(
            id,
            JobStatus::Failed {
                error: error.into(),
            },
        )
    }

    fn finish(&self, id: JobId, status: JobStatus) -> Result<Job, StoreError> {
        let mut inner = self.lock();
        let StoreInner {
            jobs,
            running,
            completed_total,
            failed_total,
        } = &mut *inner;

        let job = jobs.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if !job.status.can_transition_to(&status) {
            return Err(StoreError::InvalidTransition {
                id,
                from: job.status.as_str(),
                to: status.as_str(),
            });
        }

        match status {
            JobStatus::Completed { .. } => *completed_total += 1,
            _ => *failed_total += 1,
        }
        job.status = status;
        job.completed_at = Some(Utc::now());
        if *running == Some(id) {
            *running = None;
        }
        Ok(job.clone())
    }

    /// Remove and return a job if it is terminal.
    ///
    /// Returns `Ok(None)` while the job is pending or running, leaving it in
    /// place, so repeated calls are safe until the result is ready.
    pub fn consume_if_terminal(&self, id: JobId) -> Result<Option<Job>, StoreError> {
        let mut inner = self.lock();
        let job = inner.jobs.get(&id).ok_or(StoreError::NotFound(id))?;
        if !job.status.is_terminal() {
            return Ok(None);
        }
        Ok(inner.jobs.remove(&id))
    }

    /// Remove terminal jobs that finished at or before `cutoff`.
    pub fn purge_finished_before(&self, cutoff: DateTime<Utc>) -> Vec<Job> {
        let mut inner = self.lock();
        let expired: Vec<JobId> = inner
            .jobs
            .values()
            .filter(|job| job.status.is_terminal())
            .filter(|job| job.completed_at.is_some_and(|at| at <= cutoff))
            .map(|job| job.id)
            .collect();

        expired
            .into_iter()
            .filter_map(|id| inner.jobs.remove(&id))
            .collect()
    }

    /// Id of the job currently generating, if any.
    pub fn running(&self) -> Option<JobId> {
        self.lock().running
    }

    pub fn stats(&self) -> QueueStats {
        let inner = self.lock();
        let mut stats = QueueStats {
            completed: inner.completed_total,
            failed: inner.failed_total,
            ..Default::default()
        };
        for job in inner.jobs.values() {
            match job.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Running => stats.running += 1,
                JobStatus::Completed { .. } | JobStatus::Failed { .. } => {
                    stats.awaiting_pickup += 1
                }
            }
        }
        stats
    }

    pub fn len(&self) -> usize {
        self.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;

    fn prompt() -> Prompt {
        Prompt::new("a compass rose").expect("valid prompt")
    }

    fn artifacts() -> Vec<ArtifactRef> {
        vec![ArtifactRef::new("image_1.png")]
    }

    #[test]
    fn duplicate_ids_are_rejected() -> Result<(), StoreError> {
        let store = JobStore::new();
        let id = JobId::new();
        store.create(id, prompt())?;

        assert_eq!(store.create(id, prompt()), Err(StoreError::DuplicateId(id)));
        assert_eq!(store.len(), 1);
        Ok(())
    }

    #[test]
    fn happy_path_walks_forward_once() -> Result<(), StoreError> {
        let store = JobStore::new();
        let id = JobId::new();
        store.create(id, prompt())?;

        let running = store.transition_to_running(id)?;
        assert_eq!(running.status, JobStatus::Running);
        assert!(running.started_at.is_some());
        assert_eq!(store.running(), Some(id));

        let done = store.complete_success(id, artifacts())?;
        assert!(done.completed_at.is_some());
        assert_eq!(store.running(), None);

        // No second terminal write, no way back.
        assert!(matches!(
            store.complete_failure(id, "late"),
            Err(StoreError::InvalidTransition { from: "completed", .. })
        ));
        assert!(matches!(
            store.transition_to_running(id),
            Err(StoreError::InvalidTransition { .. })
        ));
        assert_eq!(store.get(id)?.status, JobStatus::Completed { artifacts: artifacts() });
        Ok(())
    }

    #[test]
    fn completing_requires_running() -> Result<(), StoreError> {
        let store = JobStore::new();
        let id = JobId::new();
        store.create(id, prompt())?;

        assert!(matches!(
            store.complete_success(id, artifacts()),
            Err(StoreError::InvalidTransition { from: "pending", to: "completed", .. })
        ));
        assert!(matches!(
            store.complete_failure(id, "nope"),
            Err(StoreError::InvalidTransition { from: "pending", to: "failed", .. })
        ));
        Ok(())
    }

    #[test]
    fn empty_success_is_refused() -> Result<(), StoreError> {
        let store = JobStore::new();
        let id = JobId::new();
        store.create(id, prompt())?;
        store.transition_to_running(id)?;

        assert_eq!(
            store.complete_success(id, Vec::new()),
            Err(StoreError::EmptyArtifacts(id))
        );
        assert_eq!(store.get(id)?.status, JobStatus::Running);
        Ok(())
    }

    #[test]
    fn only_one_job_runs_at_a_time() -> Result<(), StoreError> {
        let store = JobStore::new();
        let first = JobId::new();
        let second = JobId::new();
        store.create(first, prompt())?;
        store.create(second, prompt())?;

        store.transition_to_running(first)?;
        assert_eq!(
            store.transition_to_running(second),
            Err(StoreError::AlreadyRunning {
                id: second,
                running: first
            })
        );

        store.complete_failure(first, "transport: reset")?;
        store.transition_to_running(second)?;
        Ok(())
    }

    #[test]
    fn terminal_jobs_are_consumed_exactly_once() -> Result<(), StoreError> {
        let store = JobStore::new();
        let id = JobId::new();
        store.create(id, prompt())?;

        assert_eq!(store.consume_if_terminal(id)?, None);
        store.transition_to_running(id)?;
        assert_eq!(store.consume_if_terminal(id)?, None);

        store.complete_failure(id, "timeout: too slow")?;
        let job = store.consume_if_terminal(id)?.expect("terminal job");
        assert_eq!(
            job.status,
            JobStatus::Failed {
                error: "timeout: too slow".into()
            }
        );
        assert_eq!(store.consume_if_terminal(id), Err(StoreError::NotFound(id)));
        Ok(())
    }

    #[test]
    fn purge_only_touches_old_terminal_jobs() -> Result<(), StoreError> {
        let store = JobStore::new();
        let done = JobId::new();
        let waiting = JobId::new();
        store.create(done, prompt())?;
        store.create(waiting, prompt())?;
        store.transition_to_running(done)?;
        store.complete_success(done, artifacts())?;

        let earlier = Utc::now() - chrono::Duration::hours(1);
        assert!(store.purge_finished_before(earlier).is_empty());

        let purged = store.purge_finished_before(Utc::now());
        assert_eq!(purged.len(), 1);
        assert_eq!(purged[0].id, done);
        assert!(store.get(waiting).is_ok());
        Ok(())
    }

    #[test]
    fn stats_count_each_status() -> Result<(), StoreError> {
        let store = JobStore::new();
        let ids: Vec<JobId> = (0..4).map(|_| JobId::new()).collect();
        for id in &ids {
            store.create(*id, prompt())?;
        }
        store.transition_to_running(ids[0])?;
        store.complete_success(ids[0], artifacts())?;
        store.transition_to_running(ids[1])?;

        let stats = store.stats();
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.running, 1);
        assert_eq!(stats.awaiting_pickup, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 0);
        Ok(())
    }
}

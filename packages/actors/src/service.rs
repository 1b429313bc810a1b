//! Submission and status facades over the job store, queue and dispatcher.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use gen_core::{ImageProvider, JobEvent, JobId, PollOutcome, Prompt, QueueStats, ValidationError};
use ractor::{Actor, ActorRef, ActorStatus};
use storage::ArtifactStorage;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::admission::AdmissionQueue;
use crate::dispatcher::{DispatchSettings, DispatcherActor, DispatcherArgs};
use crate::messages::DispatcherMessage;
use crate::store::{JobStore, StoreError};

const EVENT_CAPACITY: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("dispatcher is not running")]
    DispatcherUnavailable,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to spawn dispatcher: {0}")]
    Spawn(#[from] ractor::SpawnErr),
}

/// Result of [`GenerationService::submit_and_wait`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The job finished within the wait and its result was consumed.
    ///
    /// Holds `NotFound` if another poller collected the result first.
    Finished(PollOutcome),
    /// The wait elapsed first; poll this id later.
    StillPending(JobId),
}

/// Entry point for callers: submit prompts, poll results.
///
/// Owns the one dispatcher actor. All methods are safe to call
/// concurrently from request handlers.
pub struct GenerationService {
    store: Arc<JobStore>,
    queue: Arc<AdmissionQueue>,
    events: broadcast::Sender<JobEvent>,
    dispatcher: ActorRef<DispatcherMessage>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl GenerationService {
    /// Spawn the dispatcher and return a ready service.
    pub async fn start(
        provider: Arc<dyn ImageProvider>,
        storage: ArtifactStorage,
        settings: DispatchSettings,
    ) -> Result<Self, ServiceError> {
        let store = Arc::new(JobStore::new());
        let queue = Arc::new(AdmissionQueue::new());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let args = DispatcherArgs {
            store: store.clone(),
            queue: queue.clone(),
            provider,
            storage,
            events: events.clone(),
            settings,
        };
        let (dispatcher, handle) = Actor::spawn(None, DispatcherActor, args).await?;

        Ok(Self {
            store,
            queue,
            events,
            dispatcher,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Validate `text` and admit it as a new job.
    pub fn submit(&self, text: impl Into<String>) -> Result<JobId, ServiceError> {
        self.submit_prompt(Prompt::new(text)?)
    }

    /// Admit an already validated prompt. Returns immediately.
    pub fn submit_prompt(&self, prompt: Prompt) -> Result<JobId, ServiceError> {
        if !self.is_running() {
            return Err(ServiceError::DispatcherUnavailable);
        }

        let id = JobId::new();
        self.store.create(id, prompt)?;
        self.queue.enqueue(id);
        let _ = self.events.send(JobEvent::JobSubmitted {
            job_id: id,
            timestamp: Utc::now(),
        });
        tracing::info!(job_id = %id, queued = self.queue.len(), "Job submitted");

        if let Err(e) = self.dispatcher.send_message(DispatcherMessage::Wake) {
            tracing::warn!(job_id = %id, error = %e, "Failed to wake dispatcher");
        }
        Ok(id)
    }

    /// Read a job's outcome.
    ///
    /// A terminal result is returned once and then removed; later polls for
    /// the same id return `NotFound`.
    pub fn poll(&self, id: JobId) -> PollOutcome {
        match self.store.consume_if_terminal(id) {
            Ok(Some(job)) => {
                let _ = self.events.send(JobEvent::JobConsumed {
                    job_id: id,
                    timestamp: Utc::now(),
                });
                tracing::debug!(job_id = %id, status = job.status.as_str(), "Result consumed");
                PollOutcome::from_status(&job.status)
            }
            Ok(None) => PollOutcome::Pending,
            Err(StoreError::NotFound(_)) => {
                tracing::debug!(job_id = %id, "Poll for unknown or consumed job");
                PollOutcome::NotFound
            }
            Err(e) => {
                tracing::error!(job_id = %id, error = %e, "Poll failed");
                PollOutcome::NotFound
            }
        }
    }

    /// Look at a job's outcome without consuming it.
    pub fn peek(&self, id: JobId) -> PollOutcome {
        self.store
            .get(id)
            .map(|job| PollOutcome::from_status(&job.status))
            .unwrap_or(PollOutcome::NotFound)
    }

    /// Submit and wait up to `wait` for the result.
    ///
    /// Waiting rides on the event stream; the job itself goes through the
    /// normal queue like any other submission.
    pub async fn submit_and_wait(
        &self,
        prompt: Prompt,
        wait: Duration,
    ) -> Result<WaitOutcome, ServiceError> {
        // Subscribe first so the terminal event cannot slip past.
        let mut events = self.events.subscribe();
        let id = self.submit_prompt(prompt)?;

        let finished = tokio::time::timeout(wait, self.wait_for_terminal(&mut events, id))
            .await
            .unwrap_or(false);

        if finished {
            Ok(WaitOutcome::Finished(self.poll(id)))
        } else {
            tracing::info!(job_id = %id, wait_secs = wait.as_secs(), "Wait elapsed, job still pending");
            Ok(WaitOutcome::StillPending(id))
        }
    }

    async fn wait_for_terminal(
        &self,
        events: &mut broadcast::Receiver<JobEvent>,
        id: JobId,
    ) -> bool {
        loop {
            match events.recv().await {
                Ok(event) if event.job_id() == id && event.is_terminal() => return true,
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(job_id = %id, skipped, "Event stream lagged");
                    if self.peek(id).is_terminal() {
                        return true;
                    }
                }
                Err(RecvError::Closed) => return false,
            }
        }
    }

    /// Subscribe to job lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    pub fn stats(&self) -> QueueStats {
        self.store.stats()
    }

    /// Whether the dispatcher actor is alive.
    ///
    /// A dispatcher still `Starting` counts: messages sent to it wait in its
    /// mailbox until the processing loop begins.
    pub fn is_running(&self) -> bool {
        matches!(
            self.dispatcher.get_status(),
            ActorStatus::Starting | ActorStatus::Running
        )
    }

    /// Stop the dispatcher and wait for it to exit.
    ///
    /// A generation in progress finishes first; jobs still queued stay
    /// pending.
    pub async fn shutdown(&self) {
        if let Err(e) = self.dispatcher.send_message(DispatcherMessage::Shutdown) {
            tracing::debug!(error = %e, "Dispatcher already stopped");
        }
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            tracing::warn!(error = %e, "Dispatcher task ended abnormally");
        }
    }
}

impl Drop for GenerationService {
    fn drop(&mut self) {
        self.dispatcher.stop(None);
    }
}

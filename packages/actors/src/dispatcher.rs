//! The single dispatcher actor.
//!
//! Exactly one `DispatcherActor` exists per [`GenerationService`], and it is
//! the only caller of the image provider. Because ractor delivers messages
//! to an actor one at a time, at most one generation is ever in flight
//! without any extra locking.
//!
//! [`GenerationService`]: crate::GenerationService

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use futures_util::FutureExt;
use gen_core::env::{self, EnvError};
use gen_core::{
    ArtifactRef, GeneratedImage, ImageProvider, Job, JobEvent, JobId, JobStatus, ProviderError,
};
use ractor::{Actor, ActorProcessingErr, ActorRef};
use storage::ArtifactStorage;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::admission::AdmissionQueue;
use crate::messages::DispatcherMessage;
use crate::store::JobStore;

const DEFAULT_JOB_TIMEOUT_SECS: u64 = 300;
const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;
const DEFAULT_RESULT_TTL_SECS: u64 = 3_600;

/// Failure recorded when the provider returns no images.
pub const NO_ARTIFACTS_ERROR: &str = "no artifacts produced";

/// Failure recorded when the provider panics.
pub const PROVIDER_PANIC_ERROR: &str = "provider panicked during generation";

/// Dispatcher tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Upper bound on one provider call, covering all of its HTTP attempts.
    pub job_timeout: Duration,
    /// How often the idle dispatcher re-checks the queue and purges results.
    pub poll_interval: Duration,
    /// How long an unread terminal result is kept.
    pub result_ttl: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            job_timeout: Duration::from_secs(DEFAULT_JOB_TIMEOUT_SECS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            result_ttl: Duration::from_secs(DEFAULT_RESULT_TTL_SECS),
        }
    }
}

impl DispatchSettings {
    /// Load settings from `JOB_TIMEOUT_SECS`, `DISPATCH_POLL_INTERVAL_MS`
    /// and `RESULT_TTL_SECS`.
    pub fn from_env() -> Result<Self, EnvError> {
        let job_timeout_secs: u64 = env::parse_or("JOB_TIMEOUT_SECS", DEFAULT_JOB_TIMEOUT_SECS)?;
        let poll_interval_ms: u64 =
            env::parse_or("DISPATCH_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)?;
        let result_ttl_secs: u64 = env::parse_or("RESULT_TTL_SECS", DEFAULT_RESULT_TTL_SECS)?;

        Self::from_values(job_timeout_secs, poll_interval_ms, result_ttl_secs)
    }

    /// Build settings from raw values, rejecting zeros.
    ///
    /// A zero TTL would purge results before anyone could read them.
    fn from_values(
        job_timeout_secs: u64,
        poll_interval_ms: u64,
        result_ttl_secs: u64,
    ) -> Result<Self, EnvError> {
        for (name, value) in [
            ("JOB_TIMEOUT_SECS", job_timeout_secs),
            ("DISPATCH_POLL_INTERVAL_MS", poll_interval_ms),
            ("RESULT_TTL_SECS", result_ttl_secs),
        ] {
            if value == 0 {
                return Err(EnvError::invalid(name, "0", "must be at least 1"));
            }
        }

        Ok(Self {
            job_timeout: Duration::from_secs(job_timeout_secs),
            poll_interval: Duration::from_millis(poll_interval_ms),
            result_ttl: Duration::from_secs(result_ttl_secs),
        })
    }
}

/// Where the dispatcher is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchPhase {
    Idle,
    Claiming,
    Generating,
    Recording,
}

impl DispatchPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            DispatchPhase::Idle => "idle",
            DispatchPhase::Claiming => "claiming",
            DispatchPhase::Generating => "generating",
            DispatchPhase::Recording => "recording",
        }
    }
}

/// Keeps at most one `Tick` waiting in the dispatcher's mailbox.
///
/// The ticker arms the gate before sending; the dispatcher clears it when
/// the tick is handled. Ticks that fall due during a long generation are
/// dropped instead of piling up.
#[derive(Debug, Default)]
struct TickGate(AtomicBool);

impl TickGate {
    /// Returns `true` if no tick is outstanding and one should be sent.
    fn arm(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }

    fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Dispatcher actor arguments.
pub struct DispatcherArgs {
    pub store: Arc<JobStore>,
    pub queue: Arc<AdmissionQueue>,
    pub provider: Arc<dyn ImageProvider>,
    pub storage: ArtifactStorage,
    pub events: broadcast::Sender<JobEvent>,
    pub settings: DispatchSettings,
}

/// State for the dispatcher actor.
pub struct DispatcherState {
    store: Arc<JobStore>,
    queue: Arc<AdmissionQueue>,
    provider: Arc<dyn ImageProvider>,
    storage: ArtifactStorage,
    events: broadcast::Sender<JobEvent>,
    settings: DispatchSettings,
    phase: DispatchPhase,
    tick_gate: Arc<TickGate>,
    ticker: Option<JoinHandle<()>>,
}

impl DispatcherState {
    fn set_phase(&mut self, phase: DispatchPhase) {
        if self.phase != phase {
            tracing::trace!(from = self.phase.as_str(), to = phase.as_str(), "Dispatcher phase");
            self.phase = phase;
        }
    }

    fn emit(&self, event: JobEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Claim and run jobs until the queue is empty.
    async fn drain(&mut self) {
        loop {
            self.set_phase(DispatchPhase::Claiming);
            let Some(id) = self.queue.try_dequeue() else {
                self.set_phase(DispatchPhase::Idle);
                return;
            };
            self.dispatch(id).await;
        }
    }

    async fn dispatch(&mut self, id: JobId) {
        self.set_phase(DispatchPhase::Generating);
        let job = match self.store.transition_to_running(id) {
            Ok(job) => job,
            Err(e) => {
                tracing::error!(job_id = %id, error = %e, "Could not start job");
                return;
            }
        };

        let queue_wait_ms = job.queue_wait_ms().unwrap_or_default();
        tracing::info!(
            job_id = %id,
            provider = self.provider.name(),
            queue_wait_ms,
            "Generating"
        );
        self.emit(JobEvent::JobStarted {
            job_id: id,
            queue_wait_ms,
            timestamp: Utc::now(),
        });

        let outcome = self.generate(&job).await;

        self.set_phase(DispatchPhase::Recording);
        self.record(id, outcome).await;
    }

    /// Call the provider under the job timeout, turning panics into errors.
    async fn generate(&self, job: &Job) -> Result<Vec<GeneratedImage>, String> {
        let provider = self.provider.clone();
        let prompt = job.prompt.clone();
        let call = AssertUnwindSafe(async move { provider.generate(&prompt).await }).catch_unwind();

        match tokio::time::timeout(self.settings.job_timeout, call).await {
            Ok(Ok(Ok(images))) => Ok(images),
            Ok(Ok(Err(e))) => Err(e.to_string()),
            Ok(Err(_panic)) => Err(PROVIDER_PANIC_ERROR.to_string()),
            Err(_elapsed) => Err(ProviderError::Timeout(format!(
                "no result within {}s",
                self.settings.job_timeout.as_secs_f64()
            ))
            .to_string()),
        }
    }

    /// Persist images and write exactly one terminal status.
    async fn record(&mut self, id: JobId, outcome: Result<Vec<GeneratedImage>, String>) {
        let result = match outcome {
            Ok(images) if images.is_empty() => Err(NO_ARTIFACTS_ERROR.to_string()),
            Ok(images) => self.store_images(&images).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(artifacts) => match self.store.complete_success(id, artifacts) {
                Ok(job) => {
                    let artifacts = match &job.status {
                        JobStatus::Completed { artifacts } => artifacts.len(),
                        _ => 0,
                    };
                    let duration_ms = job.run_duration_ms().unwrap_or_default();
                    tracing::info!(job_id = %id, artifacts, duration_ms, "Job completed");
                    self.emit(JobEvent::JobCompleted {
                        job_id: id,
                        artifacts,
                        duration_ms,
                        timestamp: Utc::now(),
                    });
                }
                Err(e) => tracing::error!(job_id = %id, error = %e, "Could not record success"),
            },
            Err(error) => match self.store.complete_failure(id, error.clone()) {
                Ok(job) => {
                    let duration_ms = job.run_duration_ms().unwrap_or_default();
                    tracing::warn!(job_id = %id, error = %error, duration_ms, "Job failed");
                    self.emit(JobEvent::JobFailed {
                        job_id: id,
                        error,
                        duration_ms,
                        timestamp: Utc::now(),
                    });
                }
                Err(e) => tracing::error!(job_id = %id, error = %e, "Could not record failure"),
            },
        }
    }

    /// Store every image, or none: a partial write is rolled back.
    async fn store_images(&self, images: &[GeneratedImage]) -> Result<Vec<ArtifactRef>, String> {
        let mut stored = Vec::with_capacity(images.len());
        for image in images {
            match self.storage.store_image(image).await {
                Ok(artifact) => stored.push(artifact),
                Err(e) => {
                    for artifact in &stored {
                        if let Err(e) = self.storage.delete(artifact.as_str()).await {
                            tracing::warn!(artifact = %artifact, error = %e, "Rollback delete failed");
                        }
                    }
                    return Err(format!("artifact storage failed: {e}"));
                }
            }
        }
        Ok(stored)
    }

    /// Drop terminal results nobody collected within the TTL.
    async fn expire_results(&self) {
        let Ok(ttl) = chrono::Duration::from_std(self.settings.result_ttl) else {
            return;
        };
        let Some(cutoff) = Utc::now().checked_sub_signed(ttl) else {
            return;
        };

        for job in self.store.purge_finished_before(cutoff) {
            if let JobStatus::Completed { artifacts } = &job.status {
                for artifact in artifacts {
                    if let Err(e) = self.storage.delete(artifact.as_str()).await {
                        tracing::warn!(job_id = %job.id, artifact = %artifact, error = %e, "Failed to delete expired artifact");
                    }
                }
            }
            tracing::info!(job_id = %job.id, status = job.status.as_str(), "Expired unread result");
            self.emit(JobEvent::JobExpired {
                job_id: job.id,
                timestamp: Utc::now(),
            });
        }
    }
}

/// Actor that drains the admission queue one job at a time.
pub struct DispatcherActor;

impl Actor for DispatcherActor {
    type Msg = DispatcherMessage;
    type State = DispatcherState;
    type Arguments = DispatcherArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!(
            provider = args.provider.name(),
            job_timeout_secs = args.settings.job_timeout.as_secs(),
            "Starting dispatcher"
        );

        // Periodic tick: catches missed wakes and drives result expiry.
        let period = args.settings.poll_interval;
        let tick_gate = Arc::new(TickGate::default());
        let gate = tick_gate.clone();
        let ticker = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if gate.arm() && myself.send_message(DispatcherMessage::Tick).is_err() {
                    break;
                }
            }
        });

        Ok(DispatcherState {
            store: args.store,
            queue: args.queue,
            provider: args.provider,
            storage: args.storage,
            events: args.events,
            settings: args.settings,
            phase: DispatchPhase::Idle,
            tick_gate,
            ticker: Some(ticker),
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            DispatcherMessage::Wake => state.drain().await,

            DispatcherMessage::Tick => {
                state.tick_gate.clear();
                state.expire_results().await;
                state.drain().await;
            }

            DispatcherMessage::Shutdown => {
                tracing::info!(pending = state.queue.len(), "Shutting down dispatcher");
                myself.stop(None);
            }
        }

        Ok(())
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        if let Some(ticker) = state.ticker.take() {
            ticker.abort();
        }
        Ok(())
    }
}

//! Shared fixtures for dispatcher tests.

#![allow(dead_code, clippy::disallowed_methods)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use actors::{DispatchSettings, GenerationService};
use gen_core::{
    GeneratedImage, ImageProvider, JobId, PollOutcome, Prompt, ProviderError, ProviderFuture,
};
use storage::{ArtifactStorage, ArtifactStoreConfig};
use tokio::sync::Semaphore;

/// Scripted provider that records how it was called.
///
/// The prompt text picks the behaviour:
/// - `gate...` blocks until [`ProbeProvider::release`] is called
/// - `fail:transport...` returns a transport error
/// - `empty...` returns no images
/// - `panic...` panics
/// - `slow...` sleeps far longer than any test timeout
/// - anything else returns one image after a short delay
#[derive(Clone, Default)]
pub struct ProbeProvider {
    inner: Arc<ProbeInner>,
}

struct ProbeInner {
    active: AtomicUsize,
    max_active: AtomicUsize,
    started: Mutex<Vec<String>>,
    gate: Semaphore,
}

impl Default for ProbeInner {
    fn default() -> Self {
        Self {
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            started: Mutex::new(Vec::new()),
            gate: Semaphore::new(0),
        }
    }
}

/// Decrements the active count even if the call panics or is cancelled.
struct ActiveGuard(Arc<ProbeInner>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ProbeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest number of overlapping calls seen.
    pub fn max_active(&self) -> usize {
        self.inner.max_active.load(Ordering::SeqCst)
    }

    pub fn active(&self) -> usize {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Prompts in the order their generation started.
    pub fn started(&self) -> Vec<String> {
        self.inner.started.lock().unwrap().clone()
    }

    /// Let one gated call finish.
    pub fn release(&self) {
        self.inner.gate.add_permits(1);
    }

    /// Wait until `count` calls have started.
    pub async fn wait_started(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.started().len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("provider calls did not start in time");
    }
}

impl ImageProvider for ProbeProvider {
    fn name(&self) -> &str {
        "probe"
    }

    fn generate(&self, prompt: &Prompt) -> ProviderFuture {
        let inner = self.inner.clone();
        let text = prompt.as_str().to_string();

        Box::pin(async move {
            let now = inner.active.fetch_add(1, Ordering::SeqCst) + 1;
            inner.max_active.fetch_max(now, Ordering::SeqCst);
            let _guard = ActiveGuard(inner.clone());
            inner.started.lock().unwrap().push(text.clone());

            if text.starts_with("gate") {
                inner.gate.acquire().await.expect("gate open").forget();
            } else if text.starts_with("slow") {
                tokio::time::sleep(Duration::from_secs(60)).await;
            } else {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }

            if text.starts_with("fail:transport") {
                return Err(ProviderError::Transport("connection reset by peer".into()));
            }
            if text.starts_with("empty") {
                return Ok(Vec::new());
            }
            if text.starts_with("panic") {
                panic!("probe provider exploded");
            }
            Ok(vec![GeneratedImage::png(text.into_bytes())])
        })
    }
}

/// Settings with short intervals for tests.
pub fn fast_settings() -> DispatchSettings {
    DispatchSettings {
        job_timeout: Duration::from_secs(5),
        poll_interval: Duration::from_millis(20),
        result_ttl: Duration::from_secs(3600),
    }
}

pub fn memory_storage() -> ArtifactStorage {
    ArtifactStorage::new(ArtifactStoreConfig::memory()).expect("memory storage")
}

/// Start a service over `provider` with in-memory storage.
pub async fn start_service(
    provider: &ProbeProvider,
    settings: DispatchSettings,
) -> (Arc<GenerationService>, ArtifactStorage) {
    let storage = memory_storage();
    let service = GenerationService::start(Arc::new(provider.clone()), storage.clone(), settings)
        .await
        .expect("service starts");
    (Arc::new(service), storage)
}

/// Poll until the job leaves `Pending`, consuming its result.
pub async fn poll_until_done(service: &GenerationService, id: JobId) -> PollOutcome {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match service.poll(id) {
                PollOutcome::Pending => tokio::time::sleep(Duration::from_millis(5)).await,
                outcome => return outcome,
            }
        }
    })
    .await
    .expect("job did not finish in time")
}

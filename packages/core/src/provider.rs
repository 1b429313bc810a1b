//! Contract for the external image generation backend.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::Prompt;

/// Raw image bytes returned by a provider, before they are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl GeneratedImage {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    pub fn png(bytes: Vec<u8>) -> Self {
        Self::new(bytes, "image/png")
    }

    /// File extension matching the mime type (`png` when unknown).
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "png",
        }
    }
}

/// Category of a provider failure, recorded in the failed job's message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    Timeout,
    Transport,
    Malformed,
    Quota,
}

impl ProviderErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderErrorKind::Timeout => "timeout",
            ProviderErrorKind::Transport => "transport",
            ProviderErrorKind::Malformed => "malformed",
            ProviderErrorKind::Quota => "quota",
        }
    }
}

impl std::fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from an image provider call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("timeout: {0}")]
    Timeout(String),

    #[error("transport: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("quota exceeded: {0}")]
    Quota(String),
}

impl ProviderError {
    pub fn kind(&self) -> ProviderErrorKind {
        match self {
            ProviderError::Timeout(_) => ProviderErrorKind::Timeout,
            ProviderError::Transport(_) => ProviderErrorKind::Transport,
            ProviderError::Malformed(_) => ProviderErrorKind::Malformed,
            ProviderError::Quota(_) => ProviderErrorKind::Quota,
        }
    }
}

/// Result type for provider calls.
pub type ProviderResult = Result<Vec<GeneratedImage>, ProviderError>;

/// Future type for async provider calls.
pub type ProviderFuture = Pin<Box<dyn Future<Output = ProviderResult> + Send>>;

/// An image generation backend.
///
/// Implementations may return partial results; an empty list is not treated
/// as success by the dispatcher.
pub trait ImageProvider: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Generate images for a prompt.
    fn generate(&self, prompt: &Prompt) -> ProviderFuture;
}

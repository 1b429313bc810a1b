//! Core domain types for the image generation queue.
//!
//! This crate contains shared types used across all packages:
//! - Job, JobStatus and PollOutcome for generation work items
//! - Prompt and LogoBrief for request payloads
//! - The ImageProvider contract for the external backend
//! - Events and statistics for observers

mod artifact;
pub mod env;
mod events;
mod job;
mod prompt;
mod provider;
mod stats;

pub use artifact::ArtifactRef;
pub use events::JobEvent;
pub use job::{Job, JobId, JobStatus, PollOutcome};
pub use prompt::{LogoBrief, MAX_PROMPT_CHARS, Prompt, ValidationError};
pub use provider::{
    GeneratedImage, ImageProvider, ProviderError, ProviderErrorKind, ProviderFuture,
    ProviderResult,
};
pub use stats::QueueStats;

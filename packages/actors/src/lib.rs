//! Queueing and dispatch for image generation jobs.
//!
//! # Architecture
//!
//! - [`JobStore`] - job records and their status transitions
//! - [`AdmissionQueue`] - FIFO of job ids waiting for the dispatcher
//! - [`DispatcherActor`] - the single ractor actor that calls the provider
//! - [`GenerationService`] - submit/poll facade that owns the dispatcher
//!
//! # Usage
//!
//! ```ignore
//! use actors::{DispatchSettings, GenerationService};
//!
//! let service = GenerationService::start(provider, storage, DispatchSettings::default()).await?;
//! let id = service.submit("a minimalist fox logo")?;
//! // later
//! let outcome = service.poll(id);
//! ```

mod admission;
mod dispatcher;
mod messages;
mod provider;
mod service;
mod store;

pub use admission::AdmissionQueue;
pub use dispatcher::{
    DispatchPhase, DispatchSettings, DispatcherActor, DispatcherArgs, NO_ARTIFACTS_ERROR,
    PROVIDER_PANIC_ERROR,
};
pub use messages::DispatcherMessage;
pub use provider::FnProvider;
pub use service::{GenerationService, ServiceError, WaitOutcome};
pub use store::{JobStore, StoreError};

#[doc(hidden)]
pub use gen_core;

//! HTTP transport for the logo generation queue.
//!
//! Thin `axum` layer over [`actors::GenerationService`]: request parsing,
//! status codes and URLs live here, queueing semantics do not.

pub mod config;
pub mod error;
pub mod router;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use error::{AppError, AppResult};
pub use router::{build_app_router, build_cors_layer};
pub use state::AppState;

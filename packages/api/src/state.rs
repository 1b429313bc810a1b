use std::sync::Arc;

use actors::GenerationService;
use storage::ArtifactStorage;

use crate::config::ServerConfig;

/// Shared application state available to all handlers via `State<AppState>`.
///
/// Cheap to clone; everything inside is behind `Arc` or already shares.
#[derive(Clone)]
pub struct AppState {
    /// Submission and status facades.
    pub service: Arc<GenerationService>,
    /// Where generated images are read back from.
    pub storage: ArtifactStorage,
    pub config: Arc<ServerConfig>,
}

//! Logo generation server.
//!
//! Wires configuration, artifact storage, the Gemini provider and the
//! generation service behind the HTTP router.

use std::process::ExitCode;
use std::sync::Arc;

use actors::{DispatchSettings, GenerationService};
use api::{AppState, ServerConfig, build_app_router};
use provider::{GeminiConfig, GeminiProvider};
use storage::ArtifactStorage;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str =
    "server=info,api=info,actors=info,provider=info,storage=info,tower_http=info";

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Server failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    // --- Configuration ---
    let config = ServerConfig::from_env()?;
    let settings = DispatchSettings::from_env()?;
    let gemini = GeminiConfig::from_env()?;
    tracing::info!(
        model = %gemini.model,
        images_per_request = gemini.images_per_request,
        job_timeout_secs = settings.job_timeout.as_secs(),
        "Configuration loaded"
    );

    // --- Collaborators ---
    let storage = ArtifactStorage::from_env()?;
    let provider = GeminiProvider::new(gemini)?;
    let service = Arc::new(GenerationService::start(Arc::new(provider), storage.clone(), settings).await?);

    // --- HTTP ---
    let addr = config.bind_addr();
    let state = AppState {
        service: service.clone(),
        storage,
        config: Arc::new(config),
    };
    let app = build_app_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let stats = service.stats();
    tracing::info!(
        pending = stats.pending,
        awaiting_pickup = stats.awaiting_pickup,
        "HTTP server stopped, stopping dispatcher"
    );
    service.shutdown().await;
    Ok(())
}

/// Resolve on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

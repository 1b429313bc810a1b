//! Shared helpers for HTTP integration tests.

#![allow(dead_code, clippy::disallowed_methods)]

use std::sync::Arc;
use std::time::Duration;

use actors::{DispatchSettings, FnProvider, GenerationService};
use api::{AppState, ServerConfig, build_app_router};
use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response};
use gen_core::{GeneratedImage, Prompt, ProviderError, ProviderFuture};
use http_body_util::BodyExt;
use serde_json::Value;
use storage::{ArtifactStorage, ArtifactStoreConfig};
use tower::ServiceExt;

pub const TEST_HOST: &str = "logos.test";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["*".to_string()],
        request_timeout_secs: 30,
        wait_timeout_secs: 5,
        public_base_url: None,
    }
}

/// Stub backend keyed on the business name inside the prompt:
/// `Doomed` fails, `Sluggish` takes a while, anything else yields one image.
fn stub_provider() -> impl gen_core::ImageProvider {
    FnProvider::new("stub", |prompt: &Prompt| -> ProviderFuture {
        let text = prompt.as_str().to_string();
        Box::pin(async move {
            if text.contains("Doomed") {
                return Err(ProviderError::Transport("upstream refused".into()));
            }
            let delay = if text.contains("Sluggish") { 500 } else { 5 };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(vec![GeneratedImage::png(b"\x89PNG fake".to_vec())])
        })
    })
}

/// The full application router plus the service behind it.
pub async fn build_test_app(config: ServerConfig) -> (Router, Arc<GenerationService>) {
    let storage = ArtifactStorage::new(ArtifactStoreConfig::memory()).expect("memory storage");
    let settings = DispatchSettings {
        poll_interval: Duration::from_millis(20),
        ..Default::default()
    };
    let service = Arc::new(
        GenerationService::start(Arc::new(stub_provider()), storage.clone(), settings)
            .await
            .expect("service starts"),
    );

    let state = AppState {
        service: service.clone(),
        storage,
        config: Arc::new(config),
    };
    (build_app_router(state), service)
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::get(uri)
        .header("host", TEST_HOST)
        .body(Body::empty())
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> Response<Body> {
    post_raw(app, uri, body.to_string()).await
}

pub async fn post_raw(app: &Router, uri: &str, body: String) -> Response<Body> {
    let request = Request::post(uri)
        .header("host", TEST_HOST)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Poll `/check-status` until the job leaves `pending`.
pub async fn poll_until_done(app: &Router, request_id: &str) -> (axum::http::StatusCode, Value) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let response = get(app, &format!("/check-status/{request_id}")).await;
            let status = response.status();
            let json = body_json(response).await;
            if json["status"] != "pending" {
                return (status, json);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("job did not finish in time")
}

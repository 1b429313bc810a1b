//! Logo submission and status routes.

use std::time::Duration;

use actors::WaitOutcome;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::header::HOST;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing::get, routing::post};
use gen_core::{ArtifactRef, JobId, LogoBrief, PollOutcome, Prompt};
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::routes::images::IMAGES_PATH;
use crate::state::AppState;

const QUEUED_MESSAGE: &str =
    "Request queued. Please use the /check-status endpoint with your request ID to get the result.";
const PENDING_MESSAGE: &str = "Your request is being processed or is in queue.";
const NOT_FOUND_MESSAGE: &str = "Unknown request ID, or its result was already collected.";

/// Body of a 202 response.
#[derive(Debug, Serialize)]
pub struct QueuedResponse {
    pub message: &'static str,
    pub request_id: String,
}

/// Body of a successful synchronous generation.
#[derive(Debug, Serialize)]
pub struct ImagesResponse {
    pub images: Vec<String>,
}

/// Body of `GET /check-status/{request_id}`.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StatusResponse {
    Pending { message: &'static str },
    Completed { images: Vec<String> },
    Failed { error: String },
    NotFound { message: &'static str },
}

fn queued(id: JobId) -> Response {
    (
        StatusCode::ACCEPTED,
        Json(QueuedResponse {
            message: QUEUED_MESSAGE,
            request_id: id.to_string(),
        }),
    )
        .into_response()
}

fn parse_brief(payload: Result<Json<LogoBrief>, JsonRejection>) -> AppResult<Prompt> {
    let Json(brief) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    Ok(brief.to_prompt()?)
}

/// Absolute URL prefix for image links.
///
/// Uses the configured public URL, else the request's `Host` header, else
/// falls back to relative links.
fn base_url(state: &AppState, headers: &HeaderMap) -> String {
    if let Some(base) = &state.config.public_base_url {
        return base.clone();
    }
    headers
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .map(|host| format!("http://{host}"))
        .unwrap_or_default()
}

fn image_urls(base: &str, artifacts: &[ArtifactRef]) -> Vec<String> {
    artifacts
        .iter()
        .map(|artifact| format!("{base}{IMAGES_PATH}/{artifact}"))
        .collect()
}

/// POST /generate-logo -- queue a logo and return its request id.
async fn generate_logo(
    State(state): State<AppState>,
    payload: Result<Json<LogoBrief>, JsonRejection>,
) -> AppResult<Response> {
    let prompt = parse_brief(payload)?;
    let id = state.service.submit_prompt(prompt)?;
    Ok(queued(id))
}

/// POST /waiting-generate-logo -- queue a logo and wait for the images.
///
/// Falls back to a 202 with the request id when the wait runs out.
async fn waiting_generate_logo(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<LogoBrief>, JsonRejection>,
) -> AppResult<Response> {
    let prompt = parse_brief(payload)?;
    let wait = Duration::from_secs(state.config.wait_timeout_secs);

    let outcome = state.service.submit_and_wait(prompt, wait).await?;
    wait_response(&base_url(&state, &headers), outcome)
}

fn wait_response(base: &str, outcome: WaitOutcome) -> AppResult<Response> {
    match outcome {
        WaitOutcome::Finished(PollOutcome::Completed { artifacts }) => {
            let images = image_urls(base, &artifacts);
            Ok(Json(ImagesResponse { images }).into_response())
        }
        WaitOutcome::Finished(PollOutcome::Failed { error }) => {
            Err(AppError::GenerationFailed(error))
        }
        // A concurrent /check-status took the result first.
        WaitOutcome::Finished(PollOutcome::NotFound) => {
            Err(AppError::NotFound(NOT_FOUND_MESSAGE.to_string()))
        }
        WaitOutcome::Finished(PollOutcome::Pending) => Err(AppError::InternalError(
            "finished job is still pending".to_string(),
        )),
        WaitOutcome::StillPending(id) => Ok(queued(id)),
    }
}

/// GET /check-status/{request_id} -- poll a job; terminal results are
/// returned once.
async fn check_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(request_id): Path<String>,
) -> Response {
    let outcome = match JobId::parse(&request_id) {
        Ok(id) => state.service.poll(id),
        Err(e) => {
            tracing::debug!(request_id = %request_id, error = %e, "Malformed request id");
            PollOutcome::NotFound
        }
    };

    let (status, body) = match outcome {
        PollOutcome::Pending => (
            StatusCode::OK,
            StatusResponse::Pending {
                message: PENDING_MESSAGE,
            },
        ),
        PollOutcome::Completed { artifacts } => (
            StatusCode::OK,
            StatusResponse::Completed {
                images: image_urls(&base_url(&state, &headers), &artifacts),
            },
        ),
        PollOutcome::Failed { error } => (StatusCode::OK, StatusResponse::Failed { error }),
        PollOutcome::NotFound => (
            StatusCode::NOT_FOUND,
            StatusResponse::NotFound {
                message: NOT_FOUND_MESSAGE,
            },
        ),
    };

    (status, Json(body)).into_response()
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/generate-logo", post(generate_logo))
        .route("/waiting-generate-logo", post(waiting_generate_logo))
        .route("/check-status/{request_id}", get(check_status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_urls_join_base_and_name() {
        let urls = image_urls(
            "http://logos.test",
            &[ArtifactRef::new("image_a.png"), ArtifactRef::new("image_b.png")],
        );
        assert_eq!(
            urls,
            [
                "http://logos.test/generated_images/image_a.png",
                "http://logos.test/generated_images/image_b.png"
            ]
        );
    }

    #[test]
    fn result_collected_elsewhere_is_not_found() {
        let err = wait_response("", WaitOutcome::Finished(PollOutcome::NotFound)).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn wait_outcomes_map_to_responses() {
        let response = wait_response(
            "http://logos.test",
            WaitOutcome::Finished(PollOutcome::Completed {
                artifacts: vec![ArtifactRef::new("image_a.png")],
            }),
        )
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = wait_response("", WaitOutcome::StillPending(JobId::new())).unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let err = wait_response(
            "",
            WaitOutcome::Finished(PollOutcome::Failed {
                error: "timeout: slow".into(),
            }),
        )
        .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn status_bodies_are_tagged() {
        let body = serde_json::to_value(StatusResponse::Failed {
            error: "timeout: slow".into(),
        })
        .unwrap();
        assert_eq!(body["status"], "failed");
        assert_eq!(body["error"], "timeout: slow");

        let body = serde_json::to_value(StatusResponse::NotFound {
            message: NOT_FOUND_MESSAGE,
        })
        .unwrap();
        assert_eq!(body["status"], "not_found");
    }
}

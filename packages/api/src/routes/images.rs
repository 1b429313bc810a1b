use axum::extract::{Path, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use axum::{Router, routing::get};

use crate::error::AppResult;
use crate::state::AppState;

/// URL prefix generated images are served under.
pub const IMAGES_PATH: &str = "/generated_images";

/// GET /generated_images/{filename} -- raw bytes of a stored image.
async fn serve_image(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> AppResult<Response> {
    let bytes = state.storage.fetch(&filename).await?;

    Ok((
        [
            (CONTENT_TYPE, storage::content_type(&filename)),
            (CACHE_CONTROL, "public, max-age=3600"),
        ],
        bytes,
    )
        .into_response())
}

pub fn router() -> Router<AppState> {
    Router::new().route(&format!("{IMAGES_PATH}/{{filename}}"), get(serve_image))
}

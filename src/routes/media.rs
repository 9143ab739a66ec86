use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use std::path::PathBuf;

use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct MediaQuery {
    pub path: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/media", get(serve))
}

/// GET /media?path=: images the pages refer to by file-system path. Only
/// pool images, shared captures and the caller's own folders are served.
pub async fn serve(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<MediaQuery>,
) -> AppResult<Response> {
    let requested = PathBuf::from(&query.path);
    let images = state.images.clone();
    let resolved =
        tokio::task::spawn_blocking(move || images.media_path(&requested, Some(&user.username)))
            .await?
            .ok_or(AppError::NotFound)?;

    let bytes = tokio::fs::read(&resolved).await?;
    let mime = mime_guess::from_path(&resolved).first_or_octet_stream();
    Ok((
        [
            (header::CONTENT_TYPE, mime.as_ref().to_string()),
            (header::CACHE_CONTROL, "no-cache".to_string()),
        ],
        bytes,
    )
        .into_response())
}

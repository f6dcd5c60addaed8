use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::error::AppError;
use crate::models::caller::Caller;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/files/*path", get(get_file))
}

async fn get_file(
    State(state): State<Arc<AppState>>,
    _caller: Caller,
    Path(path): Path<String>,
) -> Result<Response, AppError> {
    let blob = state
        .blobs
        .get(&path)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("file {path} not found")))?;

    Ok(([(header::CONTENT_TYPE, blob.content_type)], blob.bytes).into_response())
}

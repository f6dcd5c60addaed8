pub mod auth;
pub mod drivers;
pub mod extract;
pub mod files;
pub mod orders;
pub mod stores;
pub mod tickets;
pub mod ws;

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::state::AppState;
use crate::storage::blob::MAX_IMAGE_BYTES;

/// Room for the multipart framing and text fields around one image.
const UPLOAD_BODY_LIMIT: usize = MAX_IMAGE_BYTES + 64 * 1024;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(orders::router())
        .merge(drivers::router())
        .merge(stores::router())
        .merge(tickets::router())
        .merge(files::router())
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/ws", get(ws::ws_handler))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, crate::error::AppError>;

pub fn respond<T: Serialize>(message: impl Into<String>, data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse {
        success: true,
        message: message.into(),
        data,
    }))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    orders: usize,
    drivers: usize,
    stores: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.store.read(|t| (t.orders.len(), t.drivers.len(), t.stores.len())) {
        Ok((orders, drivers, stores)) => Json(HealthResponse {
            status: "ok",
            orders,
            drivers,
            stores,
        })
        .into_response(),
        Err(err) => err.into_response(),
    }
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err).into_response(),
    }
}

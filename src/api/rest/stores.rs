use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post, put};
use axum::Router;
use uuid::Uuid;

use crate::api::rest::extract::{ApiJson, ApiPath};
use crate::api::rest::{respond, ApiResult};
use crate::engine::orders::{self, RejectRequest};
use crate::engine::participants::{self, StoreProfileRequest};
use crate::models::caller::Caller;
use crate::models::order::Order;
use crate::models::participant::StoreProfile;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/stores/me", put(set_profile))
        .route("/stores/me/orders", get(store_orders))
        .route("/orders/:id/accept", post(accept_order))
        .route("/orders/:id/reject", post(reject_order))
        .route("/orders/:id/ready", post(mark_ready))
}

async fn set_profile(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    ApiJson(payload): ApiJson<StoreProfileRequest>,
) -> ApiResult<StoreProfile> {
    respond(
        "store profile updated",
        participants::set_store_profile(&state, &caller, payload).await?,
    )
}

async fn store_orders(State(state): State<Arc<AppState>>, caller: Caller) -> ApiResult<Vec<Order>> {
    respond("store orders", orders::list_store_orders(&state, &caller)?)
}

async fn accept_order(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Order> {
    respond("order accepted", orders::store_accept(&state, &caller, id)?)
}

async fn reject_order(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    ApiPath(id): ApiPath<Uuid>,
    payload: Option<ApiJson<RejectRequest>>,
) -> ApiResult<Order> {
    let request = payload.map(|ApiJson(request)| request).unwrap_or_default();
    respond(
        "order rejected",
        orders::store_reject(&state, &caller, id, request)?,
    )
}

async fn mark_ready(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Order> {
    respond("order ready for pickup", orders::store_mark_ready(&state, &caller, id)?)
}

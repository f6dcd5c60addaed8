use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::routing::{get, post};
use axum::Router;
use uuid::Uuid;

use crate::api::rest::extract::{single_image, ApiJson, ApiPath};
use crate::api::rest::{respond, ApiResult};
use crate::engine::matching::{self, AvailableOrders};
use crate::engine::orders::{self, DriverCancelRequest};
use crate::engine::participants::{self, AvailabilityRequest};
use crate::engine::proof;
use crate::models::caller::Caller;
use crate::models::order::Order;
use crate::models::participant::DriverAvailability;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers/me/available-orders", get(available_orders))
        .route("/drivers/me/orders", get(order_history))
        .route(
            "/drivers/me/availability",
            get(get_availability).put(set_availability),
        )
        .route("/orders/:id/claim", post(claim_order))
        .route("/orders/:id/pickup-proof", post(pickup_proof))
        .route("/orders/:id/delivery-proof", post(delivery_proof))
        .route("/orders/:id/driver-cancel", post(driver_cancel))
}

async fn available_orders(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> ApiResult<AvailableOrders> {
    let listing = matching::list_available(&state, &caller).await?;
    let message = if listing.available {
        "available orders"
    } else {
        "driver is not active in any region"
    };
    respond(message, listing)
}

async fn order_history(State(state): State<Arc<AppState>>, caller: Caller) -> ApiResult<Vec<Order>> {
    respond("driver orders", orders::list_driver_history(&state, &caller)?)
}

async fn get_availability(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> ApiResult<Option<DriverAvailability>> {
    respond(
        "availability",
        participants::driver_availability(&state, &caller)?,
    )
}

async fn set_availability(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    ApiJson(payload): ApiJson<AvailabilityRequest>,
) -> ApiResult<DriverAvailability> {
    respond(
        "availability updated",
        participants::set_driver_availability(&state, &caller, payload)?,
    )
}

async fn claim_order(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Order> {
    respond("order claimed", matching::claim_order(&state, &caller, id)?)
}

async fn pickup_proof(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    ApiPath(id): ApiPath<Uuid>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Order> {
    let upload = single_image(multipart).await?;
    respond(
        "pickup proof recorded",
        proof::submit_pickup_proof(&state, &caller, id, upload).await?,
    )
}

async fn delivery_proof(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    ApiPath(id): ApiPath<Uuid>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Order> {
    let upload = single_image(multipart).await?;
    respond(
        "order completed",
        proof::submit_delivery_proof(&state, &caller, id, upload).await?,
    )
}

async fn driver_cancel(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<DriverCancelRequest>,
) -> ApiResult<Order> {
    respond(
        "order cancelled",
        orders::cancel_by_driver(&state, &caller, id, payload)?,
    )
}

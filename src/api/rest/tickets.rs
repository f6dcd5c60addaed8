use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post, put};
use axum::Router;
use serde::Deserialize;

use crate::api::rest::extract::ApiJson;
use crate::api::rest::{respond, ApiResult};
use crate::engine::fare::{self, FareEstimate};
use crate::engine::ledger::{self, CreditRequest, TicketSummary};
use crate::models::caller::Caller;
use crate::models::location::GeoPoint;
use crate::models::pricing::{DeliveryPricing, PricingTable};
use crate::models::ticket::TicketTransaction;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tickets/me", get(my_tickets))
        .route("/admin/tickets", post(credit_tickets))
        .route("/admin/pricing", put(set_pricing))
        .route("/pricing", get(current_pricing))
        .route("/fares/quote", post(quote))
}

#[derive(Deserialize)]
pub struct QuoteRequest {
    pub from: GeoPoint,
    pub to: GeoPoint,
}

async fn my_tickets(State(state): State<Arc<AppState>>, caller: Caller) -> ApiResult<TicketSummary> {
    respond("tickets", ledger::ticket_summary(&state, &caller)?)
}

async fn credit_tickets(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    ApiJson(payload): ApiJson<CreditRequest>,
) -> ApiResult<TicketTransaction> {
    respond("tickets credited", ledger::credit_tickets(&state, &caller, payload)?)
}

async fn set_pricing(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    ApiJson(payload): ApiJson<PricingTable>,
) -> ApiResult<DeliveryPricing> {
    respond("pricing updated", fare::set_pricing(&state, &caller, payload)?)
}

async fn current_pricing(
    State(state): State<Arc<AppState>>,
    _caller: Caller,
) -> ApiResult<Option<DeliveryPricing>> {
    respond("pricing", fare::current_pricing(&state)?)
}

async fn quote(
    State(state): State<Arc<AppState>>,
    _caller: Caller,
    ApiJson(payload): ApiJson<QuoteRequest>,
) -> ApiResult<FareEstimate> {
    respond("fare estimate", fare::quote(&state, payload.from, payload.to).await?)
}

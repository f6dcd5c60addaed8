use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::routing::{get, post};
use axum::Router;
use uuid::Uuid;

use crate::api::rest::extract::{read_image, read_text, ApiJson, ApiPath};
use crate::api::rest::{respond, ApiResult};
use crate::engine::orders::{self, CreateOrderRequest};
use crate::engine::proof::{self, NewReport, ProofRefs};
use crate::error::AppError;
use crate::models::caller::Caller;
use crate::models::order::Order;
use crate::models::report::{ReportCategory, TransactionReport};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/cancel", post(cancel_order))
        .route("/orders/:id/proofs", get(order_proofs))
        .route("/orders/:id/reports", post(file_report).get(list_reports))
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    ApiJson(payload): ApiJson<CreateOrderRequest>,
) -> ApiResult<Order> {
    let order = orders::create_order(&state, &caller, payload).await?;
    respond("order created", order)
}

async fn list_orders(State(state): State<Arc<AppState>>, caller: Caller) -> ApiResult<Vec<Order>> {
    respond("orders", orders::list_customer_orders(&state, &caller)?)
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Order> {
    respond("order", orders::get_order(&state, &caller, id)?)
}

async fn cancel_order(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Order> {
    respond("order cancelled", orders::cancel_by_customer(&state, &caller, id)?)
}

async fn order_proofs(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ProofRefs> {
    respond("proofs", proof::order_proofs(&state, &caller, id)?)
}

fn parse_category(text: &str) -> Result<ReportCategory, AppError> {
    serde_json::from_value(serde_json::Value::String(text.trim().to_string()))
        .map_err(|_| AppError::Validation(format!("unknown report category: {text}")))
}

/// Multipart form: `category`, `detail` and an optional `photo`.
async fn file_report(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    ApiPath(id): ApiPath<Uuid>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<TransactionReport> {
    let mut multipart = multipart?;
    let mut category = None;
    let mut detail = None;
    let mut photo = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::Validation(format!("malformed multipart body: {err}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("category") => category = Some(parse_category(&read_text(field).await?)?),
            Some("detail") => detail = Some(read_text(field).await?),
            Some("photo") => photo = Some(read_image(field).await?),
            _ => {}
        }
    }

    let report = NewReport {
        category: category
            .ok_or_else(|| AppError::Validation("category is required".to_string()))?,
        detail: detail.unwrap_or_default(),
        photo,
    };

    respond("report filed", proof::file_report(&state, &caller, id, report).await?)
}

async fn list_reports(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Vec<TransactionReport>> {
    respond("reports", proof::list_reports(&state, &caller, id)?)
}

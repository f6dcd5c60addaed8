use chrono::Utc;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::engine::ledger::consume_for_completion;
use crate::engine::lifecycle::{next_status, Transition};
use crate::engine::orders::{get_order, transition_order};
use crate::error::AppError;
use crate::models::caller::{Caller, Role};
use crate::models::order::Order;
use crate::models::report::{
    ModerationStatus, ReportCategory, TransactionReport, MAX_REPORTS_PER_REPORTER,
};
use crate::state::AppState;
use crate::storage::Tables;

const MAX_DETAIL_LEN: usize = 1000;

#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProofRefs {
    pub order_id: Uuid,
    pub pickup: Vec<String>,
    pub delivery: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct NewReport {
    pub category: ReportCategory,
    pub detail: String,
    pub photo: Option<ImageUpload>,
}

/// Fails fast before an upload is stored for an order that cannot take it.
fn precheck_driver_transition(
    state: &AppState,
    caller: &Caller,
    order_id: Uuid,
    transition: Transition,
) -> Result<(), AppError> {
    state.store.read(|t| {
        let order = t
            .orders
            .get(&order_id)
            .filter(|order| order.driver_id == Some(caller.id))
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;
        next_status(order.kind, order.status, transition).map(|_| ())
    })?
}

async fn submit_proof(
    state: &AppState,
    caller: &Caller,
    order_id: Uuid,
    upload: ImageUpload,
    transition: Transition,
) -> Result<Order, AppError> {
    caller.require(Role::Driver)?;
    precheck_driver_transition(state, caller, order_id, transition)?;

    let folder = match transition {
        Transition::PickupProof => "proofs/pickup",
        _ => "proofs/delivery",
    };
    let path = state
        .blobs
        .put(folder, &upload.content_type, upload.bytes)
        .await?;

    let result = transition_order(
        state,
        order_id,
        transition,
        |order| order.driver_id == Some(caller.id),
        |tx, order| {
            if transition == Transition::DeliveryProof {
                order.delivery_proof_refs.push(path.clone());
                consume_for_completion(tx, order)
            } else {
                order.pickup_proof_refs.push(path.clone());
                Ok(())
            }
        },
    );

    if result.is_err() {
        state.blobs.remove(&path).await;
    }
    result
}

/// Records the pickup photo and moves the order to `ON_DELIVERY`.
pub async fn submit_pickup_proof(
    state: &AppState,
    caller: &Caller,
    order_id: Uuid,
    upload: ImageUpload,
) -> Result<Order, AppError> {
    let order = submit_proof(state, caller, order_id, upload, Transition::PickupProof).await?;
    info!(order_id = %order.id, driver_id = %caller.id, "pickup proof recorded");
    Ok(order)
}

/// Records the delivery photo, completes the order and charges the tickets,
/// all in one transaction.
pub async fn submit_delivery_proof(
    state: &AppState,
    caller: &Caller,
    order_id: Uuid,
    upload: ImageUpload,
) -> Result<Order, AppError> {
    let order = submit_proof(state, caller, order_id, upload, Transition::DeliveryProof).await?;
    info!(order_id = %order.id, driver_id = %caller.id, "order completed");
    Ok(order)
}

pub fn order_proofs(state: &AppState, caller: &Caller, order_id: Uuid) -> Result<ProofRefs, AppError> {
    let order = get_order(state, caller, order_id)?;
    Ok(ProofRefs {
        order_id: order.id,
        pickup: order.pickup_proof_refs,
        delivery: order.delivery_proof_refs,
    })
}

fn check_report_allowed(tables: &Tables, caller: &Caller, order_id: Uuid) -> Result<(), AppError> {
    tables
        .orders
        .get(&order_id)
        .filter(|order| order.is_party(caller.id))
        .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

    let filed = tables
        .reports
        .iter()
        .filter(|r| r.order_id == order_id && r.reporter_id == caller.id)
        .count();
    if filed >= MAX_REPORTS_PER_REPORTER {
        return Err(AppError::QuotaExceeded(format!(
            "at most {MAX_REPORTS_PER_REPORTER} reports per order"
        )));
    }
    Ok(())
}

/// Files a dispute report. The order itself is never modified.
pub async fn file_report(
    state: &AppState,
    caller: &Caller,
    order_id: Uuid,
    report: NewReport,
) -> Result<TransactionReport, AppError> {
    let detail = report.detail.trim().to_string();
    if detail.is_empty() {
        return Err(AppError::Validation("detail cannot be empty".to_string()));
    }
    if detail.chars().count() > MAX_DETAIL_LEN {
        return Err(AppError::Validation("detail is too long".to_string()));
    }

    state
        .store
        .read(|t| check_report_allowed(t, caller, order_id))??;

    let proof_ref = match report.photo {
        Some(photo) => Some(
            state
                .blobs
                .put("reports", &photo.content_type, photo.bytes)
                .await?,
        ),
        None => None,
    };

    let record = TransactionReport {
        id: Uuid::new_v4(),
        order_id,
        reporter_id: caller.id,
        category: report.category,
        detail,
        proof_ref: proof_ref.clone(),
        status: ModerationStatus::Pending,
        created_at: Utc::now(),
    };

    let result = state.store.transaction(|tx| {
        check_report_allowed(tx.tables(), caller, order_id)?;
        tx.push_report(record.clone());
        Ok(record)
    });

    match result {
        Ok(record) => {
            info!(
                order_id = %order_id,
                reporter_id = %caller.id,
                category = ?record.category,
                "report filed"
            );
            Ok(record)
        }
        Err(err) => {
            if let Some(path) = proof_ref {
                state.blobs.remove(&path).await;
            }
            Err(err)
        }
    }
}

pub fn list_reports(
    state: &AppState,
    caller: &Caller,
    order_id: Uuid,
) -> Result<Vec<TransactionReport>, AppError> {
    get_order(state, caller, order_id)?;
    state.store.read(|t| {
        t.reports
            .iter()
            .filter(|r| r.order_id == order_id && r.reporter_id == caller.id)
            .cloned()
            .collect()
    })
}

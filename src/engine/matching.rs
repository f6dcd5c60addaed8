use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::engine::fare::FareEstimate;
use crate::engine::lifecycle::{next_status, Transition};
use crate::error::AppError;
use crate::models::caller::{Caller, Role};
use crate::models::location::Region;
use crate::models::order::{relevant_region, Order, OrderKind};
use crate::models::participant::StoreStatus;
use crate::state::AppState;
use crate::storage::Tables;

#[derive(Debug, Clone, Serialize)]
pub struct AvailableOrder {
    #[serde(flatten)]
    pub order: Order,
    pub estimate: Option<FareEstimate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AvailableOrders {
    /// False when the driver has not declared an active service region.
    pub available: bool,
    pub region: Option<Region>,
    pub active_order_id: Option<Uuid>,
    pub has_active_order: bool,
    pub orders: Vec<AvailableOrder>,
}

fn store_region(tables: &Tables, order: &Order) -> Option<Region> {
    order
        .store_id
        .and_then(|id| tables.stores.get(&id))
        .map(|store| store.region)
}

fn active_order_of(tables: &Tables, driver_id: Uuid) -> Option<Uuid> {
    tables
        .orders
        .values()
        .find(|order| order.driver_id == Some(driver_id) && order.status.occupies_driver())
        .map(|order| order.id)
}

fn is_eligible(tables: &Tables, order: &Order, driver_region: Region) -> bool {
    if !order.is_open_for_claim() {
        return false;
    }

    if order.kind == OrderKind::FoodRegisteredStore {
        let store_active = order
            .store_id
            .and_then(|id| tables.stores.get(&id))
            .is_some_and(|store| store.status == StoreStatus::Active);
        if !store_active {
            return false;
        }
    }

    relevant_region(order, store_region(tables, order)).matches(driver_region)
}

pub async fn list_available(state: &AppState, caller: &Caller) -> Result<AvailableOrders, AppError> {
    caller.require(Role::Driver)?;

    let (region, active_order_id, mut candidates, pricing) = state.store.read(|t| {
        let region = t
            .drivers
            .get(&caller.id)
            .filter(|availability| availability.active)
            .map(|availability| availability.region);

        let candidates: Vec<Order> = match region {
            Some(region) => t
                .orders
                .values()
                .filter(|order| is_eligible(t, order, region))
                .cloned()
                .collect(),
            None => Vec::new(),
        };

        (
            region,
            active_order_of(t, caller.id),
            candidates,
            t.current_pricing().map(|p| p.table.clone()),
        )
    })?;

    candidates.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    let estimates = join_all(candidates.iter().map(|order| {
        let pricing = pricing.as_ref();
        async move {
            match (order.pickup.coords, order.dropoff.coords) {
                (Some(from), Some(to)) => Some(state.estimator.estimate(&from, &to, pricing).await),
                _ => None,
            }
        }
    }))
    .await;

    for estimate in estimates.iter().flatten() {
        state
            .metrics
            .fare_estimates_total
            .with_label_values(&[estimate.source.as_str()])
            .inc();
    }

    let orders = candidates
        .into_iter()
        .zip(estimates)
        .map(|(order, estimate)| AvailableOrder { order, estimate })
        .collect();

    Ok(AvailableOrders {
        available: region.is_some(),
        region,
        active_order_id,
        has_active_order: active_order_id.is_some(),
        orders,
    })
}

/// Binds the order to the calling driver. All preconditions are checked and
/// the assignment written inside one transaction, so of several drivers
/// racing for the same order exactly one wins and the rest see a conflict.
pub fn claim_order(state: &AppState, caller: &Caller, order_id: Uuid) -> Result<Order, AppError> {
    caller.require(Role::Driver)?;

    let result = state.store.transaction(|tx| {
        let tables = tx.tables();

        if tables.balance(caller.id) < 1 {
            return Err(AppError::QuotaExceeded(
                "driver has no tickets left".to_string(),
            ));
        }

        let order = tx.order(order_id)?;
        if !order.is_open_for_claim() {
            return Err(AppError::StateConflict(format!(
                "order {order_id} is no longer available"
            )));
        }

        let driver_region = tables
            .drivers
            .get(&caller.id)
            .filter(|availability| availability.active)
            .map(|availability| availability.region)
            .ok_or_else(|| {
                AppError::StateConflict("driver has no active service region".to_string())
            })?;

        if !relevant_region(order, store_region(tables, order)).matches(driver_region) {
            return Err(AppError::StateConflict(format!(
                "order {order_id} is outside the driver's region"
            )));
        }

        if let Some(active) = active_order_of(tables, caller.id) {
            return Err(AppError::StateConflict(format!(
                "driver already holds active order {active}"
            )));
        }

        let mut order = order.clone();
        order.status = next_status(order.kind, order.status, Transition::DriverClaim)?;
        order.driver_id = Some(caller.id);
        order.updated_at = Utc::now();

        tx.put_order(order.clone());
        Ok(order)
    });

    let outcome = match &result {
        Ok(_) => "success",
        Err(AppError::QuotaExceeded(_)) => "quota_exceeded",
        Err(AppError::StateConflict(_)) => "conflict",
        Err(_) => "error",
    };
    state
        .metrics
        .claims_total
        .with_label_values(&[outcome])
        .inc();

    match result {
        Ok(order) => {
            state.notify(&order);
            info!(order_id = %order.id, driver_id = %caller.id, "order claimed");
            Ok(order)
        }
        Err(err) => {
            debug!(order_id = %order_id, driver_id = %caller.id, error = %err, "claim refused");
            Err(err)
        }
    }
}

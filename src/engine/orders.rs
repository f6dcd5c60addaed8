use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::engine::lifecycle::{initial_status, next_status, Transition};
use crate::error::AppError;
use crate::models::caller::{Caller, Role};
use crate::models::location::{GeoPoint, Location, Region};
use crate::models::order::{
    CancelReason, Cancellation, Order, OrderKind, PaymentMethod,
};
use crate::models::participant::StoreStatus;
use crate::state::AppState;
use crate::storage::{Tables, Tx};

const MAX_ADDRESS_LEN: usize = 255;
const MAX_NOTE_LEN: usize = 500;

#[derive(Debug, Clone, Deserialize)]
pub struct LocationInput {
    pub address: String,
    pub region: Region,
    pub map_link: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    pub kind: OrderKind,
    pub pickup: Option<LocationInput>,
    pub dropoff: LocationInput,
    pub store_id: Option<Uuid>,
    pub item_id: Option<Uuid>,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    pub external_store_name: Option<String>,
    pub payment_method: PaymentMethod,
    pub note: Option<String>,
}

fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct DriverCancelRequest {
    pub reason: CancelReason,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RejectRequest {
    pub reason: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_create(request: &CreateOrderRequest) -> Result<(), AppError> {
    match request.kind {
        OrderKind::FoodRegisteredStore => {
            if request.store_id.is_none() {
                return Err(AppError::Validation("store_id is required".to_string()));
            }
            if request.item_id.is_none() {
                return Err(AppError::Validation("item_id is required".to_string()));
            }
        }
        OrderKind::FoodExternalStore => {
            if non_blank(request.external_store_name.clone()).is_none() {
                return Err(AppError::Validation(
                    "external_store_name is required".to_string(),
                ));
            }
            if request.pickup.is_none() {
                return Err(AppError::Validation("pickup is required".to_string()));
            }
        }
        OrderKind::Ride => {
            if request.pickup.is_none() {
                return Err(AppError::Validation("pickup is required".to_string()));
            }
        }
    }

    if request.kind != OrderKind::Ride && request.quantity == 0 {
        return Err(AppError::Validation("quantity must be > 0".to_string()));
    }
    if request
        .note
        .as_ref()
        .is_some_and(|note| note.chars().count() > MAX_NOTE_LEN)
    {
        return Err(AppError::Validation("note is too long".to_string()));
    }

    let mut locations = vec![&request.dropoff];
    if request.kind != OrderKind::FoodRegisteredStore {
        locations.extend(request.pickup.as_ref());
    }
    for location in locations {
        let address = location.address.trim();
        if address.is_empty() {
            return Err(AppError::Validation("address cannot be empty".to_string()));
        }
        if address.chars().count() > MAX_ADDRESS_LEN {
            return Err(AppError::Validation("address is too long".to_string()));
        }
    }

    Ok(())
}

fn holds_active_order(tables: &Tables, customer_id: Uuid) -> bool {
    tables
        .orders
        .values()
        .any(|order| order.customer_id == customer_id && !order.status.is_terminal())
}

/// Resolves a map link, counting the outcome. Unresolvable links are not an
/// error; the location simply has no coordinates.
pub async fn resolve_link(state: &AppState, link: &str) -> Option<GeoPoint> {
    let point = state.geocoder.resolve(link).await;
    let outcome = if point.is_some() { "resolved" } else { "unresolved" };
    state
        .metrics
        .geocode_lookups_total
        .with_label_values(&[outcome])
        .inc();
    if point.is_none() {
        debug!(link, "map link left without coordinates");
    }
    point
}

async fn resolve_location(state: &AppState, input: LocationInput) -> Location {
    let map_link = non_blank(input.map_link);
    let coords = match &map_link {
        Some(link) => resolve_link(state, link).await,
        None => None,
    };

    Location {
        address: input.address.trim().to_string(),
        coords,
        region: input.region,
        map_link,
    }
}

fn store_pickup(tables: &Tables, store_id: Uuid) -> Result<Location, AppError> {
    let store = tables
        .stores
        .get(&store_id)
        .ok_or_else(|| AppError::NotFound(format!("store {store_id} not found")))?;

    if store.status != StoreStatus::Active {
        return Err(AppError::StateConflict(format!(
            "store {store_id} is not accepting orders"
        )));
    }

    Ok(Location {
        address: store.address.clone(),
        coords: store.coords,
        region: store.region,
        map_link: store.map_link.clone(),
    })
}

pub async fn create_order(
    state: &AppState,
    caller: &Caller,
    request: CreateOrderRequest,
) -> Result<Order, AppError> {
    caller.require(Role::Customer)?;
    validate_create(&request)?;

    // Cheap pre-checks so a doomed request does not wait on map links; both
    // are repeated inside the transaction.
    state.store.read(|t| {
        if holds_active_order(t, caller.id) {
            return Err(AppError::StateConflict(
                "customer already has an active order".to_string(),
            ));
        }
        match (request.kind, request.store_id) {
            (OrderKind::FoodRegisteredStore, Some(store_id)) => store_pickup(t, store_id).map(|_| ()),
            _ => Ok(()),
        }
    })??;

    let kind = request.kind;
    let dropoff = resolve_location(state, request.dropoff).await;
    let pickup = match (kind, request.pickup) {
        (OrderKind::FoodRegisteredStore, _) | (_, None) => None,
        (_, Some(input)) => Some(resolve_location(state, input).await),
    };

    let registered = kind == OrderKind::FoodRegisteredStore;
    let now = Utc::now();

    let order = state.store.transaction(|tx| {
        if holds_active_order(tx.tables(), caller.id) {
            return Err(AppError::StateConflict(
                "customer already has an active order".to_string(),
            ));
        }

        let pickup = match (request.store_id.filter(|_| registered), pickup) {
            (Some(store_id), _) => store_pickup(tx.tables(), store_id)?,
            (None, Some(pickup)) => pickup,
            (None, None) => {
                return Err(AppError::Validation("pickup is required".to_string()));
            }
        };

        let order = Order {
            id: Uuid::new_v4(),
            kind,
            status: initial_status(kind),
            customer_id: caller.id,
            driver_id: None,
            store_id: request.store_id.filter(|_| registered),
            item_id: request.item_id.filter(|_| registered),
            quantity: if kind == OrderKind::Ride { 1 } else { request.quantity },
            pickup,
            dropoff,
            external_store_name: non_blank(request.external_store_name)
                .filter(|_| kind == OrderKind::FoodExternalStore),
            payment_method: request.payment_method,
            note: non_blank(request.note),
            pickup_proof_refs: Vec::new(),
            delivery_proof_refs: Vec::new(),
            cancellation: None,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        };

        tx.put_order(order.clone());
        Ok(order)
    })?;

    state
        .metrics
        .orders_created_total
        .with_label_values(&[order.kind.as_str()])
        .inc();
    state.notify(&order);

    info!(
        order_id = %order.id,
        customer_id = %caller.id,
        kind = order.kind.as_str(),
        status = order.status.as_str(),
        "order created"
    );
    Ok(order)
}

/// Applies `transition` to an order in one transaction. `authorize` decides
/// whether the caller may touch the order at all (others see `NotFound`);
/// `apply` runs extra checks and side effects in the same unit.
pub(crate) fn transition_order(
    state: &AppState,
    order_id: Uuid,
    transition: Transition,
    authorize: impl FnOnce(&Order) -> bool,
    apply: impl FnOnce(&mut Tx<'_>, &mut Order) -> Result<(), AppError>,
) -> Result<Order, AppError> {
    let order = state.store.transaction(|tx| {
        let mut order = tx.order(order_id)?.clone();
        if !authorize(&order) {
            return Err(AppError::NotFound(format!("order {order_id} not found")));
        }

        order.status = next_status(order.kind, order.status, transition)?;
        apply(tx, &mut order)?;
        order.updated_at = Utc::now();

        tx.put_order(order.clone());
        Ok(order)
    })?;

    state.notify(&order);
    Ok(order)
}

pub fn cancel_by_customer(
    state: &AppState,
    caller: &Caller,
    order_id: Uuid,
) -> Result<Order, AppError> {
    caller.require(Role::Customer)?;

    let order = transition_order(
        state,
        order_id,
        Transition::CustomerCancel,
        |order| order.customer_id == caller.id,
        |_, order| {
            order.cancellation = Some(Cancellation {
                by: Role::Customer,
                reason: Some(CancelReason::CustomerRequested),
                detail: None,
            });
            Ok(())
        },
    )?;

    info!(order_id = %order.id, customer_id = %caller.id, "order cancelled by customer");
    Ok(order)
}

pub fn store_accept(state: &AppState, caller: &Caller, order_id: Uuid) -> Result<Order, AppError> {
    caller.require(Role::Store)?;

    let order = transition_order(
        state,
        order_id,
        Transition::StoreAccept,
        |order| order.store_id == Some(caller.id),
        |tx, _| {
            if tx.tables().balance(caller.id) < 1 {
                return Err(AppError::QuotaExceeded(
                    "store has no tickets left".to_string(),
                ));
            }
            Ok(())
        },
    )?;

    info!(order_id = %order.id, store_id = %caller.id, "order accepted by store");
    Ok(order)
}

pub fn store_reject(
    state: &AppState,
    caller: &Caller,
    order_id: Uuid,
    request: RejectRequest,
) -> Result<Order, AppError> {
    caller.require(Role::Store)?;

    let order = transition_order(
        state,
        order_id,
        Transition::StoreReject,
        |order| order.store_id == Some(caller.id),
        |_, order| {
            order.rejection_reason = non_blank(request.reason);
            Ok(())
        },
    )?;

    info!(order_id = %order.id, store_id = %caller.id, "order rejected by store");
    Ok(order)
}

pub fn store_mark_ready(
    state: &AppState,
    caller: &Caller,
    order_id: Uuid,
) -> Result<Order, AppError> {
    caller.require(Role::Store)?;

    let order = transition_order(
        state,
        order_id,
        Transition::StoreMarkReady,
        |order| order.store_id == Some(caller.id),
        |_, _| Ok(()),
    )?;

    info!(order_id = %order.id, store_id = %caller.id, "order ready for pickup");
    Ok(order)
}

pub fn cancel_by_driver(
    state: &AppState,
    caller: &Caller,
    order_id: Uuid,
    request: DriverCancelRequest,
) -> Result<Order, AppError> {
    caller.require(Role::Driver)?;

    let detail = non_blank(request.detail);
    if request.reason == CancelReason::Other && detail.is_none() {
        return Err(AppError::Validation(
            "detail is required when the reason is OTHER".to_string(),
        ));
    }

    let order = transition_order(
        state,
        order_id,
        Transition::DriverCancel,
        |order| order.driver_id == Some(caller.id),
        |_, order| {
            order.cancellation = Some(Cancellation {
                by: Role::Driver,
                reason: Some(request.reason),
                detail,
            });
            Ok(())
        },
    )?;

    info!(
        order_id = %order.id,
        driver_id = %caller.id,
        reason = ?request.reason,
        "order cancelled by driver"
    );
    Ok(order)
}

pub fn get_order(state: &AppState, caller: &Caller, order_id: Uuid) -> Result<Order, AppError> {
    state.store.read(|t| {
        t.orders
            .get(&order_id)
            .filter(|order| caller.role == Role::Admin || order.is_party(caller.id))
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))
    })?
}

fn list_where(state: &AppState, keep: impl Fn(&Order) -> bool) -> Result<Vec<Order>, AppError> {
    state.store.read(|t| {
        let mut orders: Vec<Order> = t.orders.values().filter(|o| keep(o)).cloned().collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders
    })
}

pub fn list_customer_orders(state: &AppState, caller: &Caller) -> Result<Vec<Order>, AppError> {
    caller.require(Role::Customer)?;
    list_where(state, |order| order.customer_id == caller.id)
}

pub fn list_driver_history(state: &AppState, caller: &Caller) -> Result<Vec<Order>, AppError> {
    caller.require(Role::Driver)?;
    list_where(state, |order| order.driver_id == Some(caller.id))
}

pub fn list_store_orders(state: &AppState, caller: &Caller) -> Result<Vec<Order>, AppError> {
    caller.require(Role::Store)?;
    list_where(state, |order| order.store_id == Some(caller.id))
}

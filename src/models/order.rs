use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::caller::Role;
use crate::models::location::{Location, Region};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderKind {
    FoodRegisteredStore,
    FoodExternalStore,
    Ride,
}

impl OrderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderKind::FoodRegisteredStore => "FOOD_REGISTERED_STORE",
            OrderKind::FoodExternalStore => "FOOD_EXTERNAL_STORE",
            OrderKind::Ride => "RIDE",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    WaitingStoreConfirm,
    Rejected,
    ConfirmedCooking,
    SearchingDriver,
    DriverAssigned,
    OnDelivery,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }

    /// A driver holding an order in one of these states may not claim another.
    pub fn occupies_driver(&self) -> bool {
        matches!(self, OrderStatus::DriverAssigned | OrderStatus::OnDelivery)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::WaitingStoreConfirm => "WAITING_STORE_CONFIRM",
            OrderStatus::Rejected => "REJECTED",
            OrderStatus::ConfirmedCooking => "CONFIRMED_COOKING",
            OrderStatus::SearchingDriver => "SEARCHING_DRIVER",
            OrderStatus::DriverAssigned => "DRIVER_ASSIGNED",
            OrderStatus::OnDelivery => "ON_DELIVERY",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    EWallet,
}

/// Reasons a driver may give when abandoning an external-store order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CancelReason {
    StoreNotFound,
    StoreClosed,
    DriverQuotaInsufficient,
    CustomerRequested,
    DriverUnavailable,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cancellation {
    pub by: Role,
    pub reason: Option<CancelReason>,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub kind: OrderKind,
    pub status: OrderStatus,
    pub customer_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub store_id: Option<Uuid>,
    pub item_id: Option<Uuid>,
    pub quantity: u32,
    /// For external-store orders this is the store's own location and
    /// `pickup.map_link` is the store's map link.
    pub pickup: Location,
    pub dropoff: Location,
    pub external_store_name: Option<String>,
    pub payment_method: PaymentMethod,
    pub note: Option<String>,
    pub pickup_proof_refs: Vec<String>,
    pub delivery_proof_refs: Vec<String>,
    pub cancellation: Option<Cancellation>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn is_party(&self, user_id: Uuid) -> bool {
        self.customer_id == user_id
            || self.driver_id == Some(user_id)
            || self.store_id == Some(user_id)
    }

    pub fn is_open_for_claim(&self) -> bool {
        self.status == OrderStatus::SearchingDriver && self.driver_id.is_none()
    }
}

/// Region an order is matched on: the store's region for registered-store
/// orders, otherwise the pickup region declared with the order.
///
/// Registered-store pickups are copied from the store record at creation, so
/// both cases read `pickup.region`; the store's current region is preferred
/// when the caller has it at hand.
pub fn relevant_region(order: &Order, store_region: Option<Region>) -> Region {
    match order.kind {
        OrderKind::FoodRegisteredStore => store_region.unwrap_or(order.pickup.region),
        OrderKind::FoodExternalStore | OrderKind::Ride => order.pickup.region,
    }
}

/// Broadcast to dashboards after every state-mutating operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderChange {
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub at: DateTime<Utc>,
}

use crate::error::AppError;
use crate::models::order::{OrderKind, OrderStatus};

/// Every action that moves an order between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    StoreAccept,
    StoreReject,
    StoreMarkReady,
    DriverClaim,
    PickupProof,
    DeliveryProof,
    CustomerCancel,
    DriverCancel,
}

pub fn initial_status(kind: OrderKind) -> OrderStatus {
    match kind {
        OrderKind::FoodRegisteredStore => OrderStatus::WaitingStoreConfirm,
        OrderKind::FoodExternalStore | OrderKind::Ride => OrderStatus::SearchingDriver,
    }
}

/// The order state machine. Anything not listed is a conflict.
pub fn next_status(
    kind: OrderKind,
    status: OrderStatus,
    transition: Transition,
) -> Result<OrderStatus, AppError> {
    use OrderKind::*;
    use OrderStatus::*;
    use Transition::*;

    let next = match (kind, status, transition) {
        (FoodRegisteredStore, WaitingStoreConfirm, StoreAccept) => Some(ConfirmedCooking),
        (FoodRegisteredStore, WaitingStoreConfirm, StoreReject) => Some(Rejected),
        (FoodRegisteredStore, WaitingStoreConfirm, CustomerCancel) => Some(Cancelled),
        (FoodRegisteredStore, ConfirmedCooking, StoreMarkReady) => Some(SearchingDriver),

        (FoodExternalStore | Ride, SearchingDriver, CustomerCancel) => Some(Cancelled),
        (FoodExternalStore, DriverAssigned, DriverCancel) => Some(Cancelled),

        (_, SearchingDriver, DriverClaim) => Some(DriverAssigned),
        (_, DriverAssigned, PickupProof) => Some(OnDelivery),
        (_, OnDelivery, DeliveryProof) => Some(Completed),

        _ => None,
    };

    next.ok_or_else(|| {
        AppError::StateConflict(format!(
            "cannot apply {transition:?} to a {} order in status {}",
            kind.as_str(),
            status.as_str()
        ))
    })
}

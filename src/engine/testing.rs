use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::engine::orders::{CreateOrderRequest, LocationInput};
use crate::geo::geocode::NoNetwork;
use crate::geo::routing::NoRouting;
use crate::models::caller::{Caller, Role};
use crate::models::location::{GeoPoint, Region};
use crate::models::order::{OrderKind, PaymentMethod};
use crate::models::participant::{DriverAvailability, StoreProfile, StoreStatus};
use crate::models::ticket::{NewTicketPosting, TicketKind};
use crate::state::AppState;
use crate::storage::blob::MemoryBlobStore;
use crate::storage::MemoryStore;

pub fn test_state() -> AppState {
    AppState::new(
        64,
        Arc::new(MemoryStore::new()),
        Arc::new(NoNetwork),
        Arc::new(NoRouting),
        Arc::new(MemoryBlobStore::new()),
    )
}

pub fn customer() -> Caller {
    Caller::new(Uuid::new_v4(), Role::Customer)
}

pub fn grant(state: &AppState, user_id: Uuid, amount: i64) {
    state
        .store
        .transaction(|tx| {
            tx.post_ticket(NewTicketPosting {
                user_id,
                kind: TicketKind::Adjustment,
                amount,
                order_id: None,
                note: None,
            })
        })
        .unwrap();
}

pub fn driver(state: &AppState, region: Region, tickets: i64) -> Caller {
    let caller = Caller::new(Uuid::new_v4(), Role::Driver);
    state
        .store
        .transaction(|tx| {
            tx.put_driver(DriverAvailability {
                driver_id: caller.id,
                region,
                active: true,
                updated_at: Utc::now(),
            });
            Ok(())
        })
        .unwrap();
    if tickets != 0 {
        grant(state, caller.id, tickets);
    }
    caller
}

pub fn set_driver_active(state: &AppState, caller: &Caller, active: bool) {
    state
        .store
        .transaction(|tx| {
            let mut availability = tx.tables().drivers[&caller.id].clone();
            availability.active = active;
            tx.put_driver(availability);
            Ok(())
        })
        .unwrap();
}

pub fn store(state: &AppState, region: Region, status: StoreStatus) -> Caller {
    let caller = Caller::new(Uuid::new_v4(), Role::Store);
    state
        .store
        .transaction(|tx| {
            tx.put_store(StoreProfile {
                store_id: caller.id,
                name: "Kantin Teknik".to_string(),
                address: "Kantin Fakultas Teknik".to_string(),
                coords: Some(GeoPoint {
                    lat: -6.3621,
                    lng: 106.8235,
                }),
                map_link: None,
                region,
                status,
                updated_at: Utc::now(),
            });
            Ok(())
        })
        .unwrap();
    caller
}

pub fn set_store_status(state: &AppState, store_id: Uuid, status: StoreStatus) {
    state
        .store
        .transaction(|tx| {
            let mut profile = tx.tables().stores[&store_id].clone();
            profile.status = status;
            tx.put_store(profile);
            Ok(())
        })
        .unwrap();
}

fn location(address: &str, region: Region, link: &str) -> LocationInput {
    LocationInput {
        address: address.to_string(),
        region,
        map_link: Some(link.to_string()),
    }
}

pub fn ride_request(region: Region) -> CreateOrderRequest {
    CreateOrderRequest {
        kind: OrderKind::Ride,
        pickup: Some(location(
            "Stasiun UI",
            region,
            "https://maps.google.com/?q=-6.3609,106.8317",
        )),
        dropoff: location(
            "Asrama UI",
            region,
            "https://maps.google.com/?q=-6.3488,106.8296",
        ),
        store_id: None,
        item_id: None,
        quantity: 1,
        external_store_name: None,
        payment_method: PaymentMethod::Cash,
        note: None,
    }
}

pub fn external_request(region: Region) -> CreateOrderRequest {
    CreateOrderRequest {
        kind: OrderKind::FoodExternalStore,
        external_store_name: Some("Warung Bu Siti".to_string()),
        quantity: 2,
        ..ride_request(region)
    }
}

pub fn registered_request(store_id: Uuid) -> CreateOrderRequest {
    CreateOrderRequest {
        kind: OrderKind::FoodRegisteredStore,
        pickup: None,
        store_id: Some(store_id),
        item_id: Some(Uuid::new_v4()),
        quantity: 1,
        ..ride_request(Region::Central)
    }
}

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::caller::{Caller, Role};
use crate::models::order::{Order, OrderKind};
use crate::models::ticket::{NewTicketPosting, TicketKind, TicketTransaction};
use crate::state::AppState;
use crate::storage::Tx;

#[derive(Debug, Clone, Deserialize)]
pub struct CreditRequest {
    pub user_id: Uuid,
    pub kind: TicketKind,
    pub amount: i64,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TicketSummary {
    pub user_id: Uuid,
    pub balance: i64,
    pub transactions: Vec<TicketTransaction>,
}

pub fn credit_tickets(
    state: &AppState,
    caller: &Caller,
    request: CreditRequest,
) -> Result<TicketTransaction, AppError> {
    caller.require(Role::Admin)?;

    match request.kind {
        TicketKind::Grant | TicketKind::Purchase if request.amount <= 0 => {
            return Err(AppError::Validation(
                "grants and purchases must be positive".to_string(),
            ));
        }
        TicketKind::Adjustment if request.amount == 0 => {
            return Err(AppError::Validation("adjustment cannot be zero".to_string()));
        }
        TicketKind::Consumption => {
            return Err(AppError::Validation(
                "consumption is recorded by order completion only".to_string(),
            ));
        }
        _ => {}
    }

    let record = state.store.transaction(|tx| {
        tx.post_ticket(NewTicketPosting {
            user_id: request.user_id,
            kind: request.kind,
            amount: request.amount,
            order_id: None,
            note: request.note.clone(),
        })
    })?;

    info!(
        user_id = %record.user_id,
        amount = record.amount,
        balance = record.balance_after,
        admin_id = %caller.id,
        "tickets credited"
    );
    Ok(record)
}

pub fn ticket_summary(state: &AppState, caller: &Caller) -> Result<TicketSummary, AppError> {
    state.store.read(|t| {
        let mut transactions: Vec<TicketTransaction> = t
            .ticket_log
            .iter()
            .filter(|record| record.user_id == caller.id)
            .cloned()
            .collect();
        transactions.reverse();

        TicketSummary {
            user_id: caller.id,
            balance: t.balance(caller.id),
            transactions,
        }
    })
}

/// Charges the completion of `order` inside the caller's transaction: one
/// ticket from the driver, and one from the store for registered-store
/// orders. Balances may go negative.
pub fn consume_for_completion(tx: &mut Tx<'_>, order: &Order) -> Result<(), AppError> {
    let driver_id = order
        .driver_id
        .ok_or_else(|| AppError::Internal(format!("order {} has no driver", order.id)))?;

    tx.post_ticket(NewTicketPosting {
        user_id: driver_id,
        kind: TicketKind::Consumption,
        amount: -1,
        order_id: Some(order.id),
        note: Some("delivery completed".to_string()),
    })?;

    if order.kind == OrderKind::FoodRegisteredStore {
        let store_id = order
            .store_id
            .ok_or_else(|| AppError::Internal(format!("order {} has no store", order.id)))?;

        tx.post_ticket(NewTicketPosting {
            user_id: store_id,
            kind: TicketKind::Consumption,
            amount: -1,
            order_id: Some(order.id),
            note: Some("delivery completed".to_string()),
        })?;
    }

    Ok(())
}

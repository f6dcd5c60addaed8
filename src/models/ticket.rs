use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketKind {
    Grant,
    Purchase,
    Consumption,
    Adjustment,
}

/// One immutable ledger line. `balance_after` is the denormalized balance
/// right after this posting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketTransaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: TicketKind,
    pub amount: i64,
    pub balance_after: i64,
    pub order_id: Option<Uuid>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTicketPosting {
    pub user_id: Uuid,
    pub kind: TicketKind,
    pub amount: i64,
    pub order_id: Option<Uuid>,
    pub note: Option<String>,
}

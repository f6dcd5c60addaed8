use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MAX_REPORTS_PER_REPORTER: usize = 2;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportCategory {
    DriverFault,
    CustomerFault,
    StoreFault,
}

/// Reports enter moderation as `Pending`; reviewing them happens outside
/// this service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModerationStatus {
    Pending,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionReport {
    pub id: Uuid,
    pub order_id: Uuid,
    pub reporter_id: Uuid,
    pub category: ReportCategory,
    pub detail: String,
    pub proof_ref: Option<String>,
    pub status: ModerationStatus,
    pub created_at: DateTime<Utc>,
}

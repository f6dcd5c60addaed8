use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Customer,
    Driver,
    Store,
    Admin,
}

impl std::str::FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CUSTOMER" => Ok(Role::Customer),
            "DRIVER" => Ok(Role::Driver),
            "STORE" => Ok(Role::Store),
            "ADMIN" => Ok(Role::Admin),
            other => Err(AppError::Unauthorized(format!("unknown role: {other}"))),
        }
    }
}

/// The authenticated user on whose behalf an operation runs.
///
/// Identity is established upstream; the core only trusts what it is handed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub id: Uuid,
    pub role: Role,
}

impl Caller {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    pub fn require(&self, role: Role) -> Result<(), AppError> {
        if self.role == role {
            Ok(())
        } else {
            Err(AppError::Unauthorized(format!(
                "operation requires role {role:?}"
            )))
        }
    }
}

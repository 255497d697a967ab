//! Account roles

use serde::{Deserialize, Serialize};

/// Account role (RBAC)
///
/// Roles are fixed at registration time. `Admin` accounts cannot be created
/// through the public registration endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(type_name = "text", rename_all = "snake_case"))]
pub enum Role {
    Customer,
    StoreOwner,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::StoreOwner => "store_owner",
            Self::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "customer" => Some(Self::Customer),
            "store_owner" => Some(Self::StoreOwner),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    /// Whether this role is tied to a store
    pub fn requires_store(&self) -> bool {
        matches!(self, Self::StoreOwner)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

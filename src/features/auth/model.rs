use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::Type;
use utoipa::ToSchema;

/// Role of a principal, both as recorded on uploads and as claimed by a viewer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type, ToSchema)]
#[sqlx(type_name = "uploader_role", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Owner,
    Contractor,
    Salesperson,
    Customer,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::Owner,
        Role::Contractor,
        Role::Salesperson,
        Role::Customer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "OWNER",
            Role::Contractor => "CONTRACTOR",
            Role::Salesperson => "SALESPERSON",
            Role::Customer => "CUSTOMER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == normalized)
            .ok_or_else(|| format!("Unknown role '{}'", s.trim()))
    }
}

/// Caller identity as supplied with the request.
///
/// Nothing here is verified: the role and user id are taken at face value.
/// `role` is `None` when the caller sent a role this service does not know,
/// which every access decision treats as "deny".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    pub role: Option<Role>,
    pub user_id: String,
}

impl Requester {
    pub fn new(role: Option<Role>, user_id: impl Into<String>) -> Self {
        Self {
            role,
            user_id: user_id.into(),
        }
    }

    /// Build from raw query values; unknown role strings become `None`
    pub fn from_raw(role: &str, user_id: Option<&str>) -> Self {
        Self {
            role: role.parse().ok(),
            user_id: user_id.map(str::trim).unwrap_or_default().to_string(),
        }
    }
}

//! Admin tiers and the fixed permission table derived from them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "admin_daily")]
    Daily,
    #[serde(rename = "admin_weekly")]
    Weekly,
    #[serde(rename = "admin_yearly")]
    Yearly,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Daily, Role::Weekly, Role::Yearly];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Daily => "admin_daily",
            Role::Weekly => "admin_weekly",
            Role::Yearly => "admin_yearly",
        }
    }

    pub fn permissions(&self) -> Permissions {
        let base = Permissions {
            can_create_entries: true,
            can_view_entries: true,
            can_update_entries: true,
            can_delete_entries: true,
            can_upload_photos: true,
            ..Permissions::default()
        };

        match self {
            Role::Daily => base,
            Role::Weekly => Permissions {
                can_view_history: true,
                ..base
            },
            Role::Yearly => Permissions {
                can_view_history: true,
                can_view_statistics: true,
                can_manage_users: true,
                can_run_cleanup: true,
                ..base
            },
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin_daily" => Ok(Role::Daily),
            "admin_weekly" => Ok(Role::Weekly),
            "admin_yearly" => Ok(Role::Yearly),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Permissions {
    pub can_create_entries: bool,
    pub can_view_entries: bool,
    pub can_update_entries: bool,
    pub can_delete_entries: bool,
    pub can_upload_photos: bool,
    pub can_view_history: bool,
    pub can_view_statistics: bool,
    pub can_manage_users: bool,
    pub can_run_cleanup: bool,
}

/// Turns a permission flag into a `Forbidden` error when it is not granted.
pub fn require(granted: bool) -> Result<(), AppError> {
    if granted {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

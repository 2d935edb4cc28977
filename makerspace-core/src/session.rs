//! The identity an operation runs on behalf of.
//!
//! Authentication itself lives in the hosted identity service; the portal only
//! carries the resulting user id, display name and role around.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PortalError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Member,
    #[serde(alias = "management")]
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Member => f.write_str("member"),
            Role::Admin => f.write_str("admin"),
        }
    }
}

impl FromStr for Role {
    type Err = PortalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "member" | "" => Ok(Role::Member),
            // The portal treats the management department as admins too.
            "admin" | "management" => Ok(Role::Admin),
            other => Err(PortalError::Parse(format!("Unknown role '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String,
    pub username: String,
    #[serde(default)]
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, username: impl Into<String>, role: Role) -> Self {
        Actor {
            user_id: user_id.into(),
            username: username.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Creators may change their own events; admins may change any.
    pub fn may_modify(&self, created_by: &str) -> bool {
        self.user_id == created_by || self.is_admin()
    }
}

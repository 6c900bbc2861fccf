use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::OwnerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Admin,
}

impl Role {
    pub fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" | "administrator" => Self::Admin,
            _ => Self::Student,
        }
    }
}

/// Identity of the signed-in caller. Built once the auth provider has verified the
/// user and handed to each operation by reference; dropped at sign-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    owner_id: OwnerId,
    role: Role,
    signed_in_at: DateTime<Utc>,
}

impl Session {
    pub fn sign_in(owner_id: OwnerId, role: Role) -> Self {
        let session = Self {
            owner_id,
            role,
            signed_in_at: Utc::now(),
        };
        info!(owner_id = %session.owner_id, role = ?session.role, "session started");
        session
    }

    pub fn sign_out(self) -> OwnerId {
        info!(owner_id = %self.owner_id, "session ended");
        self.owner_id
    }

    pub fn owner_id(&self) -> &OwnerId {
        &self.owner_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn signed_in_at(&self) -> DateTime<Utc> {
        self.signed_in_at
    }
}

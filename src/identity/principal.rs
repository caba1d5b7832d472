use serde::{Deserialize, Serialize};

use crate::store::UserRecord;

/// Persisted role tier of a user record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

/// Ordered capability level gating route access: Anonymous < User < Admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    Anonymous,
    User,
    Admin,
}

impl Role {
    pub fn capability(self) -> Capability {
        match self {
            Role::User => Capability::User,
            Role::Admin => Capability::Admin,
        }
    }
}

impl Capability {
    /// A level satisfies every requirement at or below itself; no other
    /// relation exists.
    pub fn satisfies(self, required: Capability) -> bool {
        self >= required
    }
}

/// Non-authoritative metadata carried for logging and response shaping only.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DisplayFields {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Resolved identity of a request. Attached to the request for its lifetime
/// and never persisted.
///
/// Invariant: `role == Admin` is reachable only through the elevated-access
/// verification path or a persisted record whose role field is admin; it is
/// never inferred from request data alone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub display: DisplayFields,
}

impl Principal {
    /// Fixed well-known id for the elevated-access administrator; no user
    /// record backs it and no store lookup occurs on that path.
    pub const ELEVATED_ADMIN_ID: &'static str = "elevated-admin";

    pub fn elevated_admin(username: &str) -> Self {
        Self {
            id: Self::ELEVATED_ADMIN_ID.to_string(),
            role: Role::Admin,
            display: DisplayFields { username: Some(username.to_string()), email: None },
        }
    }

    /// Build from a store record, stripping sensitive fields.
    pub fn from_record(record: &UserRecord) -> Self {
        Self {
            id: record.id.clone(),
            role: record.role,
            display: DisplayFields {
                username: Some(record.username.clone()),
                email: record.email.clone(),
            },
        }
    }
}

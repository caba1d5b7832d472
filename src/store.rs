//! Read-only seam over the user-record store.
//! This subsystem never writes user records; it only confirms a bearer
//! subject still exists and fetches current role/profile state.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use thiserror::Error;

use crate::identity::Role;

/// The store's view of a user. `password_hash` is sensitive and is stripped
/// before the identity leaves this subsystem as a `Principal`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    pub role: Role,
    #[serde(default, skip_serializing)]
    pub password_hash: Option<String>,
}

/// Infrastructure failure, distinct from "user not found".
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("user store unavailable: {0}")]
    Unavailable(String),
}

/// Lookup into the user-record store. RPITIT, no dyn dispatch; the resolver
/// is generic over the store implementation.
pub trait UserStore: Send + Sync {
    fn find_by_id(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<UserRecord>, StoreError>> + Send;
}

/// In-memory store used by tests and the dev server.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<String, UserRecord>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: UserRecord) {
        self.users.write().insert(record.id.clone(), record);
    }

    pub fn remove(&self, id: &str) -> bool {
        self.users.write().remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }
}

impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.users.read().get(id).cloned())
    }
}

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt::{Display, Formatter};

/// Deterministic fingerprint for otherwise-anonymous requests.
///
/// A label for moderation correlation only: not an authentication credential,
/// carries no privilege, and is never matched against stored state by this
/// subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SessionIdentifier(String);

impl SessionIdentifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SessionIdentifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the anonymous session identifier from connection-level attributes.
///
/// Pure function: identical inputs always produce identical output. Fields
/// are length-prefixed before hashing so differing field boundaries cannot
/// collide. The timestamp makes the label per-request rather than stable
/// across requests from the same client; see DESIGN.md.
pub fn derive_session_id(source_addr: &str, agent: &str, timestamp_ms: i64) -> SessionIdentifier {
    let mut hasher = Sha256::new();
    hasher.update((source_addr.len() as u64).to_be_bytes());
    hasher.update(source_addr.as_bytes());
    hasher.update((agent.len() as u64).to_be_bytes());
    hasher.update(agent.as_bytes());
    hasher.update(timestamp_ms.to_be_bytes());
    SessionIdentifier(hex::encode(hasher.finalize()))
}

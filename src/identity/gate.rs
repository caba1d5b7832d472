//! Authorization gate: composes a resolved identity with the capability a
//! route requires, and is the single place translating internal error kinds
//! to the stable status/reason contract.

use axum::http::HeaderMap;
use serde::Serialize;

use crate::error::AppError;
use crate::identity::{
    derive_session_id, Capability, Principal, ResolutionError, Resolver, SessionIdentifier,
};
use crate::store::UserStore;
use crate::tprintln;

/// Machine-readable reason codes consumers rely on.
pub mod reason {
    pub const NO_CREDENTIAL: &str = "NO_CREDENTIAL";
    pub const INVALID_ELEVATED_CREDENTIAL: &str = "INVALID_ELEVATED_CREDENTIAL";
    pub const INVALID_BEARER_CREDENTIAL: &str = "INVALID_BEARER_CREDENTIAL";
    pub const PRINCIPAL_NOT_FOUND: &str = "PRINCIPAL_NOT_FOUND";
    pub const INSUFFICIENT_ROLE: &str = "INSUFFICIENT_ROLE";
    pub const STORE_UNAVAILABLE: &str = "STORE_UNAVAILABLE";
    pub const CANCELLED: &str = "CANCELLED";
}

/// Identity attached to the request context for its lifetime: a resolved
/// principal, or the anonymous sentinel with its derived session fingerprint.
/// Never absent on an admitted request.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RequestIdentity {
    Principal(Principal),
    Anonymous { session_id: SessionIdentifier },
}

impl RequestIdentity {
    pub fn capability(&self) -> Capability {
        match self {
            RequestIdentity::Principal(p) => p.role.capability(),
            RequestIdentity::Anonymous { .. } => Capability::Anonymous,
        }
    }

    pub fn principal(&self) -> Option<&Principal> {
        match self {
            RequestIdentity::Principal(p) => Some(p),
            RequestIdentity::Anonymous { .. } => None,
        }
    }

    /// Stable label for logging: principal id or anonymous fingerprint.
    pub fn label(&self) -> &str {
        match self {
            RequestIdentity::Principal(p) => &p.id,
            RequestIdentity::Anonymous { session_id } => session_id.as_str(),
        }
    }
}

/// Connection-level attributes feeding the anonymous fingerprint.
#[derive(Debug, Clone, Default)]
pub struct ConnInfo {
    pub source_addr: String,
    pub agent: String,
    pub timestamp_ms: i64,
}

/// Capability check alone; no I/O. A route requiring `Admin` rejects any
/// identity whose capability is lower regardless of which verification path
/// produced it: elevated-token and persisted-admin-record are equally
/// authoritative once resolved.
pub fn authorize(identity: &RequestIdentity, required: Capability) -> Result<(), AppError> {
    if identity.capability().satisfies(required) {
        Ok(())
    } else {
        Err(AppError::forbidden(reason::INSUFFICIENT_ROLE, "principal lacks the required role"))
    }
}

/// Full admission pipeline: resolve credentials, fall back to an anonymous
/// fingerprint where the route tolerates it, then gate on the required
/// capability. Returns the identity to attach to the request context; its
/// only side effect is the resolver's bounded store lookup.
pub async fn admit<S: UserStore>(
    resolver: &Resolver<S>,
    headers: &HeaderMap,
    conn: &ConnInfo,
    required: Capability,
) -> Result<RequestIdentity, AppError> {
    let identity = match resolver.resolve(headers).await {
        Ok(principal) => RequestIdentity::Principal(principal),
        Err(ResolutionError::NoCredential) if required == Capability::Anonymous => {
            let session_id = derive_session_id(&conn.source_addr, &conn.agent, conn.timestamp_ms);
            tprintln!("gate.admit anonymous sid={}", session_id);
            RequestIdentity::Anonymous { session_id }
        }
        Err(e) => return Err(resolution_to_wire(e)),
    };
    authorize(&identity, required)?;
    Ok(identity)
}

/// Single translation point from resolver failures to the wire contract.
/// Infrastructure faults and aborted lookups are kept distinct from
/// credential rejections so clients do not discard still-valid credentials.
fn resolution_to_wire(err: ResolutionError) -> AppError {
    match err {
        ResolutionError::NoCredential => {
            AppError::unauthorized(reason::NO_CREDENTIAL, "no credential presented")
        }
        ResolutionError::InvalidElevatedCredential(_) => AppError::unauthorized(
            reason::INVALID_ELEVATED_CREDENTIAL,
            "elevated credential rejected",
        ),
        ResolutionError::InvalidBearerCredential(_) => {
            AppError::unauthorized(reason::INVALID_BEARER_CREDENTIAL, "bearer credential rejected")
        }
        ResolutionError::PrincipalNotFound => {
            AppError::unauthorized(reason::PRINCIPAL_NOT_FOUND, "credential subject not found")
        }
        ResolutionError::StoreUnavailable(_) => {
            AppError::unavailable(reason::STORE_UNAVAILABLE, "identity backend unavailable")
        }
        ResolutionError::Cancelled => {
            AppError::unavailable(reason::CANCELLED, "resolution aborted before completion")
        }
    }
}

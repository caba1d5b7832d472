//! Fixed-precedence identity resolution over credential candidates extracted
//! from request headers.
//!
//! The elevated path is tried first; a malformed elevated attempt fails hard
//! rather than silently downgrading to standard or anonymous auth, which
//! would mask a misconfigured admin console. A decoded-but-unmatched triple
//! (wrong admin secret) falls through to the bearer path, matching the
//! consoles' legacy behavior.

use axum::http::{header::AUTHORIZATION, HeaderMap};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use crate::codec::{self, DecodeError, ElevatedAccessToken};
use crate::config::AuthConfig;
use crate::identity::Principal;
use crate::store::{StoreError, UserStore};

/// Truthy marker signalling the client intends the elevated path.
pub const ELEVATED_MODE_HEADER: &str = "x-elevated-mode";
/// Reversible-encoded `{username}:{secret}:{timestamp}` triple.
pub const ELEVATED_TOKEN_HEADER: &str = "x-elevated-token";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("no credential presented")]
    NoCredential,
    #[error("invalid elevated credential: {0}")]
    InvalidElevatedCredential(DecodeError),
    #[error("invalid bearer credential: {0}")]
    InvalidBearerCredential(DecodeError),
    #[error("bearer subject has no user record")]
    PrincipalNotFound,
    #[error("user store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("resolution aborted before completion")]
    Cancelled,
}

/// Credential candidates pulled off the wire before any verification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialCandidates {
    pub elevated_marker: bool,
    pub elevated_token: Option<String>,
    pub bearer: Option<String>,
}

fn is_truthy(v: &str) -> bool {
    let v = v.trim();
    v == "1" || v.eq_ignore_ascii_case("true")
}

pub fn extract_candidates(headers: &HeaderMap) -> CredentialCandidates {
    let elevated_marker = headers
        .get(ELEVATED_MODE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(is_truthy)
        .unwrap_or(false);
    let elevated_token = headers
        .get(ELEVATED_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|s| s.to_string());
    CredentialCandidates { elevated_marker, elevated_token, bearer }
}

/// Resolves request credentials into a `Principal`.
///
/// Holds only the immutable process-wide configuration and the read-only
/// store handle; safe to share across concurrent requests.
pub struct Resolver<S> {
    config: Arc<AuthConfig>,
    store: S,
}

impl<S: UserStore> Resolver<S> {
    pub fn new(config: Arc<AuthConfig>, store: S) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Resolve with fixed precedence: elevated path, then standard bearer,
    /// then no-credential. Atomic: no partial success.
    pub async fn resolve(&self, headers: &HeaderMap) -> Result<Principal, ResolutionError> {
        let candidates = extract_candidates(headers);
        self.resolve_candidates(&candidates).await
    }

    pub async fn resolve_candidates(
        &self,
        candidates: &CredentialCandidates,
    ) -> Result<Principal, ResolutionError> {
        if candidates.elevated_marker {
            if let Some(token) = &candidates.elevated_token {
                match codec::decode_elevated(token) {
                    Err(e) => {
                        warn!(error = %e, "elevated token failed to decode");
                        return Err(ResolutionError::InvalidElevatedCredential(e));
                    }
                    Ok(triple) => {
                        if let Some(principal) = self.verify_elevated(&triple)? {
                            return Ok(principal);
                        }
                        // Decoded but unmatched: fall through to the bearer path.
                    }
                }
            }
        }
        if let Some(bearer) = &candidates.bearer {
            return self.resolve_bearer(bearer).await;
        }
        Err(ResolutionError::NoCredential)
    }

    /// Check the decoded triple against the provisioned administrator
    /// credential. No store lookup occurs on this path.
    fn verify_elevated(
        &self,
        triple: &ElevatedAccessToken,
    ) -> Result<Option<Principal>, ResolutionError> {
        let admin = &self.config.admin;
        if triple.username != admin.username || !admin.verify_secret(&triple.secret) {
            return Ok(None);
        }
        // The credential itself verified; a stale timestamp is a hard failure
        // rather than a downgrade.
        if let Some(max_age) = self.config.elevated_max_age {
            let age_ms = Utc::now().timestamp_millis() - triple.issued_at_ms;
            if age_ms > max_age.as_millis() as i64 {
                warn!(age_ms, "elevated token exceeded configured max age");
                return Err(ResolutionError::InvalidElevatedCredential(DecodeError::Expired));
            }
        }
        Ok(Some(Principal::elevated_admin(&admin.username)))
    }

    async fn resolve_bearer(&self, token: &str) -> Result<Principal, ResolutionError> {
        let claims = codec::decode_bearer(
            token,
            &self.config.issuer,
            self.config.bearer_secret.as_bytes(),
        )
        .map_err(ResolutionError::InvalidBearerCredential)?;

        // Single suspension point: confirm the subject still exists and fetch
        // current role/profile state, bounded so a stalled store cannot hold
        // the authorization path open.
        let lookup = self.store.find_by_id(&claims.sub);
        let record = match tokio::time::timeout(self.config.store_timeout, lookup).await {
            Err(_) => {
                warn!(subject = %claims.sub, "user-store lookup exceeded bound, aborting resolution");
                return Err(ResolutionError::Cancelled);
            }
            Ok(Err(StoreError::Unavailable(msg))) => {
                return Err(ResolutionError::StoreUnavailable(msg))
            }
            Ok(Ok(None)) => return Err(ResolutionError::PrincipalNotFound),
            Ok(Ok(Some(record))) => record,
        };
        Ok(Principal::from_record(&record))
    }
}

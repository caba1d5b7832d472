//! Wire codecs for the two credential formats.
//!
//! The elevated-access token is a reversible base64url encoding of a
//! colon-delimited `{username}:{secret}:{issued_at_ms}` triple: an
//! obfuscation, not a signature. Forgery resistance comes from the
//! server-side comparison against the hashed provisioned credential.
//! The bearer identity token is a signed, time-bounded HS256 claim.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Typed decode failure; attacker-controlled input must always land here,
/// never in a panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("malformed credential")]
    Malformed,
    #[error("signature verification failed")]
    SignatureInvalid,
    #[error("credential expired")]
    Expired,
}

/// Decoded elevated-access triple. Proves administrative intent only once the
/// username/secret pair verifies against the provisioned credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElevatedAccessToken {
    pub username: String,
    pub secret: String,
    pub issued_at_ms: i64,
}

pub fn encode_elevated(username: &str, secret: &str, issued_at_ms: i64) -> String {
    URL_SAFE_NO_PAD.encode(format!("{}:{}:{}", username, secret, issued_at_ms))
}

pub fn decode_elevated(token: &str) -> Result<ElevatedAccessToken, DecodeError> {
    let raw = URL_SAFE_NO_PAD.decode(token.trim()).map_err(|_| DecodeError::Malformed)?;
    let text = String::from_utf8(raw).map_err(|_| DecodeError::Malformed)?;
    let parts: Vec<&str> = text.split(':').collect();
    if parts.len() != 3 {
        return Err(DecodeError::Malformed);
    }
    let issued_at_ms: i64 = parts[2].parse().map_err(|_| DecodeError::Malformed)?;
    Ok(ElevatedAccessToken {
        username: parts[0].to_string(),
        secret: parts[1].to_string(),
        issued_at_ms,
    })
}

/// Claims carried by a bearer identity token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BearerClaims {
    /// Subject: the persisted user id.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

/// Mint a bearer identity token for the given user id.
pub fn sign_bearer(user_id: &str, issuer: &str, ttl: Duration, secret: &[u8]) -> anyhow::Result<String> {
    let now = Utc::now();
    let claims = BearerClaims {
        sub: user_id.to_string(),
        iat: now.timestamp(),
        exp: now.timestamp() + ttl.as_secs() as i64,
        iss: issuer.to_string(),
    };
    let token = encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(secret))?;
    Ok(token)
}

/// Verify a bearer token's signature, expiry and issuer against the shared
/// secret. Signature validity needs no database round trip; confirming the
/// referenced user still exists is the resolver's job.
pub fn decode_bearer(token: &str, issuer: &str, secret: &[u8]) -> Result<BearerClaims, DecodeError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[issuer]);
    validation.set_required_spec_claims(&["exp", "iss", "sub"]);
    match decode::<BearerClaims>(token, &DecodingKey::from_secret(secret), &validation) {
        Ok(data) => Ok(data.claims),
        Err(e) => Err(match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => DecodeError::Expired,
            jsonwebtoken::errors::ErrorKind::InvalidSignature => DecodeError::SignatureInvalid,
            _ => DecodeError::Malformed,
        }),
    }
}

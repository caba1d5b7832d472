//! Identity resolver integration tests: precedence between the elevated and
//! bearer paths, bearer verification, and the store failure taxonomy.
//! These tests exercise positive and negative paths for each credential kind.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::http::{HeaderMap, HeaderName, HeaderValue};

use echogate::codec::{self, DecodeError};
use echogate::config::{AdminCredential, AuthConfig};
use echogate::identity::{ResolutionError, Resolver, Role};
use echogate::store::{MemoryUserStore, StoreError, UserRecord, UserStore};

// Argon2 for generating PHC hashes in tests
use argon2::{Argon2, PasswordHasher};
use password_hash::SaltString;

const ADMIN_USER: &str = "superadmin";
const ADMIN_SECRET: &str = "WhisperEcho@2025";

fn phc_for(password: &str) -> String {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).expect("salt");
    let salt = SaltString::encode_b64(&salt_bytes).expect("salt b64");
    let argon2 = Argon2::default();
    argon2.hash_password(password.as_bytes(), &salt).unwrap().to_string()
}

fn test_config() -> AuthConfig {
    AuthConfig {
        bearer_secret: "resolver-test-secret".to_string(),
        issuer: "echogate".to_string(),
        bearer_ttl: Duration::from_secs(300),
        admin: AdminCredential::from_phc(ADMIN_USER, phc_for(ADMIN_SECRET)),
        elevated_max_age: None,
        store_timeout: Duration::from_millis(100),
    }
}

fn headers(entries: &[(&str, String)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (k, v) in entries {
        map.insert(
            HeaderName::from_bytes(k.as_bytes()).unwrap(),
            HeaderValue::from_str(v).unwrap(),
        );
    }
    map
}

fn bearer_for(config: &AuthConfig, user_id: &str) -> String {
    codec::sign_bearer(user_id, &config.issuer, config.bearer_ttl, config.bearer_secret.as_bytes())
        .unwrap()
}

fn seeded_store() -> MemoryUserStore {
    let store = MemoryUserStore::new();
    store.insert(UserRecord {
        id: "u-1".to_string(),
        username: "ada".to_string(),
        email: Some("ada@example.com".to_string()),
        role: Role::User,
        password_hash: Some("$argon2id$not-real".to_string()),
    });
    store.insert(UserRecord {
        id: "u-ops".to_string(),
        username: "ops".to_string(),
        email: None,
        role: Role::Admin,
        password_hash: None,
    });
    store
}

/// Store that always fails with an infrastructure error.
struct FailingStore;

impl UserStore for FailingStore {
    async fn find_by_id(&self, _id: &str) -> std::result::Result<Option<UserRecord>, StoreError> {
        Err(StoreError::Unavailable("injected outage".to_string()))
    }
}

/// Store that never answers within the resolver's bound.
struct SlowStore;

impl UserStore for SlowStore {
    async fn find_by_id(&self, _id: &str) -> std::result::Result<Option<UserRecord>, StoreError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(None)
    }
}

#[tokio::test]
async fn bearer_round_trip_resolves_existing_user() -> Result<()> {
    let config = Arc::new(test_config());
    let resolver = Resolver::new(config.clone(), seeded_store());
    let map = headers(&[("authorization", format!("Bearer {}", bearer_for(&config, "u-1")))]);

    let principal = resolver.resolve(&map).await.expect("resolution should succeed");
    assert_eq!(principal.id, "u-1");
    assert_eq!(principal.role, Role::User);
    assert_eq!(principal.display.username.as_deref(), Some("ada"));
    Ok(())
}

#[tokio::test]
async fn persisted_admin_record_resolves_admin_role() -> Result<()> {
    let config = Arc::new(test_config());
    let resolver = Resolver::new(config.clone(), seeded_store());
    let map = headers(&[("authorization", format!("Bearer {}", bearer_for(&config, "u-ops")))]);

    let principal = resolver.resolve(&map).await.expect("resolution should succeed");
    assert_eq!(principal.role, Role::Admin);
    Ok(())
}

#[tokio::test]
async fn tampered_bearer_is_rejected() -> Result<()> {
    let config = Arc::new(test_config());
    let resolver = Resolver::new(config.clone(), seeded_store());
    let token = bearer_for(&config, "u-1");
    let (head, sig) = token.rsplit_once('.').unwrap();
    let first = sig.chars().next().unwrap();
    let flipped = if first == 'A' { 'B' } else { 'A' };
    let map = headers(&[("authorization", format!("Bearer {}.{}{}", head, flipped, &sig[1..]))]);

    match resolver.resolve(&map).await {
        Err(ResolutionError::InvalidBearerCredential(DecodeError::SignatureInvalid)) => {}
        other => panic!("expected signature failure, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn expired_bearer_is_rejected() -> Result<()> {
    let config = Arc::new(test_config());
    let resolver = Resolver::new(config.clone(), seeded_store());
    // exp far enough in the past to clear default validation leeway
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
    let now = chrono::Utc::now().timestamp();
    let claims = codec::BearerClaims {
        sub: "u-1".to_string(),
        iat: now - 7200,
        exp: now - 3600,
        iss: config.issuer.clone(),
    };
    let stale = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.bearer_secret.as_bytes()),
    )?;
    let map = headers(&[("authorization", format!("Bearer {}", stale))]);

    match resolver.resolve(&map).await {
        Err(ResolutionError::InvalidBearerCredential(DecodeError::Expired)) => {}
        other => panic!("expected expired failure, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn valid_bearer_for_missing_user_is_principal_not_found() -> Result<()> {
    let config = Arc::new(test_config());
    let resolver = Resolver::new(config.clone(), seeded_store());
    let map = headers(&[("authorization", format!("Bearer {}", bearer_for(&config, "u-gone")))]);

    assert_eq!(resolver.resolve(&map).await, Err(ResolutionError::PrincipalNotFound));
    Ok(())
}

#[tokio::test]
async fn store_outage_is_not_conflated_with_missing_user() -> Result<()> {
    let config = Arc::new(test_config());
    let resolver = Resolver::new(config.clone(), FailingStore);
    let map = headers(&[("authorization", format!("Bearer {}", bearer_for(&config, "u-1")))]);

    match resolver.resolve(&map).await {
        Err(ResolutionError::StoreUnavailable(msg)) => assert_eq!(msg, "injected outage"),
        other => panic!("expected store outage, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn stalled_store_lookup_is_aborted() -> Result<()> {
    let config = Arc::new(test_config());
    let resolver = Resolver::new(config.clone(), SlowStore);
    let map = headers(&[("authorization", format!("Bearer {}", bearer_for(&config, "u-1")))]);

    assert_eq!(resolver.resolve(&map).await, Err(ResolutionError::Cancelled));
    Ok(())
}

#[tokio::test]
async fn elevated_match_needs_no_store_lookup() -> Result<()> {
    // A failing store proves the elevated path performs no lookup at all.
    let config = Arc::new(test_config());
    let resolver = Resolver::new(config, FailingStore);
    let token = codec::encode_elevated(ADMIN_USER, ADMIN_SECRET, 1_700_000_000_000);
    let map = headers(&[
        ("x-elevated-mode", "true".to_string()),
        ("x-elevated-token", token),
    ]);

    let principal = resolver.resolve(&map).await.expect("elevated path should succeed");
    assert_eq!(principal.role, Role::Admin);
    assert_eq!(principal.id, echogate::identity::Principal::ELEVATED_ADMIN_ID);
    Ok(())
}

#[tokio::test]
async fn elevated_timestamp_is_unchecked_by_default() -> Result<()> {
    let config = Arc::new(test_config());
    let resolver = Resolver::new(config, MemoryUserStore::new());
    for issued_at in [0i64, -1, 1, i64::MAX / 2] {
        let token = codec::encode_elevated(ADMIN_USER, ADMIN_SECRET, issued_at);
        let map = headers(&[
            ("x-elevated-mode", "1".to_string()),
            ("x-elevated-token", token),
        ]);
        let principal = resolver.resolve(&map).await.expect("timestamp must not be validated");
        assert_eq!(principal.role, Role::Admin);
    }
    Ok(())
}

#[tokio::test]
async fn elevated_max_age_rejects_stale_tokens_when_configured() -> Result<()> {
    let mut config = test_config();
    config.elevated_max_age = Some(Duration::from_secs(60));
    let resolver = Resolver::new(Arc::new(config), MemoryUserStore::new());

    let now_ms = chrono::Utc::now().timestamp_millis();
    let fresh = codec::encode_elevated(ADMIN_USER, ADMIN_SECRET, now_ms);
    let map = headers(&[
        ("x-elevated-mode", "true".to_string()),
        ("x-elevated-token", fresh),
    ]);
    assert!(resolver.resolve(&map).await.is_ok());

    let stale = codec::encode_elevated(ADMIN_USER, ADMIN_SECRET, now_ms - 7_200_000);
    let map = headers(&[
        ("x-elevated-mode", "true".to_string()),
        ("x-elevated-token", stale),
    ]);
    match resolver.resolve(&map).await {
        Err(ResolutionError::InvalidElevatedCredential(DecodeError::Expired)) => {}
        other => panic!("expected stale elevated rejection, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn malformed_elevated_never_falls_through_to_bearer() -> Result<()> {
    let config = Arc::new(test_config());
    let resolver = Resolver::new(config.clone(), seeded_store());
    // A valid bearer rides along; it must not be consulted.
    let map = headers(&[
        ("x-elevated-mode", "true".to_string()),
        ("x-elevated-token", "!!not-base64!!".to_string()),
        ("authorization", format!("Bearer {}", bearer_for(&config, "u-1"))),
    ]);

    match resolver.resolve(&map).await {
        Err(ResolutionError::InvalidElevatedCredential(DecodeError::Malformed)) => {}
        other => panic!("expected hard elevated failure, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn wrong_admin_secret_falls_through_to_bearer() -> Result<()> {
    let config = Arc::new(test_config());
    let resolver = Resolver::new(config.clone(), seeded_store());
    let token = codec::encode_elevated(ADMIN_USER, "wrong", 1_700_000_000_000);
    let map = headers(&[
        ("x-elevated-mode", "true".to_string()),
        ("x-elevated-token", token),
        ("authorization", format!("Bearer {}", bearer_for(&config, "u-1"))),
    ]);

    let principal = resolver.resolve(&map).await.expect("bearer fallback should succeed");
    assert_eq!(principal.id, "u-1");
    assert_eq!(principal.role, Role::User);
    Ok(())
}

#[tokio::test]
async fn wrong_admin_secret_without_bearer_is_no_credential() -> Result<()> {
    let config = Arc::new(test_config());
    let resolver = Resolver::new(config, seeded_store());
    let token = codec::encode_elevated(ADMIN_USER, "wrong", 1_700_000_000_000);
    let map = headers(&[
        ("x-elevated-mode", "true".to_string()),
        ("x-elevated-token", token),
    ]);

    assert_eq!(resolver.resolve(&map).await, Err(ResolutionError::NoCredential));
    Ok(())
}

#[tokio::test]
async fn elevated_token_without_marker_is_ignored() -> Result<()> {
    let config = Arc::new(test_config());
    let resolver = Resolver::new(config, seeded_store());
    let token = codec::encode_elevated(ADMIN_USER, ADMIN_SECRET, 1_700_000_000_000);
    let map = headers(&[("x-elevated-token", token)]);

    assert_eq!(resolver.resolve(&map).await, Err(ResolutionError::NoCredential));
    Ok(())
}

#[tokio::test]
async fn marker_without_token_uses_bearer() -> Result<()> {
    let config = Arc::new(test_config());
    let resolver = Resolver::new(config.clone(), seeded_store());
    let map = headers(&[
        ("x-elevated-mode", "true".to_string()),
        ("authorization", format!("Bearer {}", bearer_for(&config, "u-1"))),
    ]);

    let principal = resolver.resolve(&map).await.expect("bearer should resolve");
    assert_eq!(principal.id, "u-1");
    Ok(())
}

#[tokio::test]
async fn no_headers_is_no_credential() -> Result<()> {
    let config = Arc::new(test_config());
    let resolver = Resolver::new(config, seeded_store());
    assert_eq!(resolver.resolve(&HeaderMap::new()).await, Err(ResolutionError::NoCredential));
    Ok(())
}

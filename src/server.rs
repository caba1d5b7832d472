//!
//! echogate HTTP boundary
//! ----------------------
//! This module defines the Axum router and the admission middleware that
//! fronts every guarded route.
//!
//! Responsibilities:
//! - Extract credential candidates from request headers and run the gate
//!   before any business logic executes.
//! - Attach the resolved `RequestIdentity` to request extensions; downstream
//!   handlers must not re-derive identity.
//! - Map every gate failure to the stable status/reason JSON contract.
//! - Stamp an `x-request-id` header for tracing.
//! - First-run dev seeding of the in-memory user store and startup logs.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use chrono::Utc;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::identity::{admit, Capability, ConnInfo, RequestIdentity, Resolver, Role};
use crate::codec;
use crate::store::{MemoryUserStore, UserRecord, UserStore};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Shared server state injected into the admission middleware.
/// Holds the resolver, which in turn holds the immutable process-wide
/// configuration and the read-only user store.
pub struct AppState<S> {
    pub resolver: Arc<Resolver<S>>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self { resolver: self.resolver.clone() }
    }
}

/// Per-route-group admission state: the shared resolver plus the capability
/// the guarded routes require.
struct Guard<S> {
    state: AppState<S>,
    required: Capability,
}

impl<S> Clone for Guard<S> {
    fn clone(&self) -> Self {
        Self { state: self.state.clone(), required: self.required }
    }
}

fn agent_of(headers: &HeaderMap) -> String {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Admission middleware: runs the gate, attaches the identity, stamps the
/// request id. Rejected requests never reach the inner handler.
async fn admit_layer<S: UserStore + 'static>(
    State(guard): State<Guard<S>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    mut request: Request,
    next: Next,
) -> Response {
    let conn = ConnInfo {
        source_addr: addr.to_string(),
        agent: agent_of(request.headers()),
        timestamp_ms: Utc::now().timestamp_millis(),
    };
    let identity =
        match admit(&guard.state.resolver, request.headers(), &conn, guard.required).await {
            Ok(identity) => identity,
            Err(e) => return e.into_response(),
        };
    debug!(identity = %identity.label(), path = %request.uri().path(), "request admitted");

    let request_id = Uuid::new_v4().to_string();
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        request.headers_mut().insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    request.extensions_mut().insert(identity);

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    response
}

async fn session(Extension(identity): Extension<RequestIdentity>) -> Json<serde_json::Value> {
    Json(json!({
        "identity": identity.label(),
        "authenticated": identity.principal().is_some(),
    }))
}

async fn whoami(Extension(identity): Extension<RequestIdentity>) -> Json<serde_json::Value> {
    Json(json!({ "principal": identity.principal() }))
}

async fn admin_ping(Extension(identity): Extension<RequestIdentity>) -> Json<serde_json::Value> {
    Json(json!({ "ok": true, "admin": identity.label() }))
}

/// Mount all routes with their capability guards.
pub fn router<S: UserStore + 'static>(state: AppState<S>) -> Router {
    let anon = Guard { state: state.clone(), required: Capability::Anonymous };
    let user = Guard { state: state.clone(), required: Capability::User };
    let admin = Guard { state, required: Capability::Admin };

    Router::new()
        .route("/", get(|| async { "echogate ok" }))
        .route(
            "/session",
            get(session).layer(middleware::from_fn_with_state(anon, admit_layer::<S>)),
        )
        .route("/me", get(whoami).layer(middleware::from_fn_with_state(user, admit_layer::<S>)))
        .route(
            "/admin/ping",
            get(admin_ping).layer(middleware::from_fn_with_state(admin, admit_layer::<S>)),
        )
}

/// Seed the dev store with a demo user on first run and log a ready-to-use
/// bearer token so the gate can be exercised immediately.
fn seed_dev_store(store: &MemoryUserStore, config: &AuthConfig) -> anyhow::Result<()> {
    if !store.is_empty() {
        return Ok(());
    }
    println!("Empty startup detected, seeding demo user");
    store.insert(UserRecord {
        id: "u-demo".to_string(),
        username: "demo".to_string(),
        email: Some("demo@example.com".to_string()),
        role: Role::User,
        password_hash: None,
    });
    let token = codec::sign_bearer(
        "u-demo",
        &config.issuer,
        config.bearer_ttl,
        config.bearer_secret.as_bytes(),
    )?;
    info!(user = "u-demo", "demo user seeded; dev bearer token: {}", token);
    Ok(())
}

/// Start the echogate HTTP server bound to the given port.
///
/// Loads the immutable auth configuration once, seeds the dev store, and
/// mounts the guarded routes.
pub async fn run_with_port(http_port: u16) -> anyhow::Result<()> {
    let config = Arc::new(AuthConfig::from_env()?);
    let store = MemoryUserStore::new();
    seed_dev_store(&store, &config)?;

    let state = AppState { resolver: Arc::new(Resolver::new(config, store)) };
    let app = router(state);

    let addr: SocketAddr = format!("0.0.0.0:{}", http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}

/// Convenience entry point using the default port.
pub async fn run() -> anyhow::Result<()> {
    run_with_port(8090).await
}

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    fmt().with_env_filter(filter).init();

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    let http_port = std::env::var("ECHOGATE_HTTP_PORT").unwrap_or_else(|_| "8090".to_string());
    let issuer = std::env::var("ECHOGATE_ISSUER").unwrap_or_else(|_| "echogate".to_string());
    info!(
        target: "echogate",
        "echogate starting: RUST_LOG='{}', http_port={}, issuer='{}'",
        rust_log, http_port, issuer
    );

    echogate::server::run_with_port(http_port.parse()?).await
}

use manifestkit::{config::ManifestKitConfig, router};
use std::net::SocketAddr;

/// ManifestKit standalone server entry point.
///
/// Initializes tracing, loads and validates configuration, then serves the
/// manifest route in front of the record API.
///
/// # Configuration
/// Environment variables:
/// - `MANIFESTKIT_RECORD_API`: record API base URL
/// - `MANIFESTKIT_FULLTEXT_API`: full-text API base URL used in search services
/// - `MANIFESTKIT_BASE_URL`: public base URL for manifest ids
/// - `MANIFESTKIT_TIMEOUT_SECS`: record API timeout (default: 10)
/// - `DISABLE_RATE_LIMIT`: turn off per-IP rate limiting when set
/// - `PORT`: HTTP listen port (default: 8080)
/// - `RUST_LOG`: Logging verbosity (default: "manifestkit=debug,tower_http=debug")
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "manifestkit=debug,tower_http=debug".into())
        )
        .init();

    tracing::info!("Starting ManifestKit server");

    let cfg = ManifestKitConfig::from_env()?;
    cfg.validate()?;
    tracing::info!("Record API: {}", cfg.record_api_url);

    let app = router(cfg)?;

    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse::<u16>()
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Server listening on {}", addr);

    // Peer addresses feed the per-IP rate limiter
    axum::serve(
        tokio::net::TcpListener::bind(addr).await?,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

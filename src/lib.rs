use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::trace::TraceLayer;

pub mod cache;
pub mod config;
pub mod manifest;
pub mod negotiate;
pub mod origin;
pub mod record;
pub mod service;
pub mod validate;

use crate::config::ManifestKitConfig;
use crate::manifest::{JsonLdManifestBuilder, ManifestBuilder};
use crate::negotiate::{negotiate_version, Negotiation};
use crate::record::{RecordApiClient, RecordSource};
use crate::service::{ClientConditions, ManifestRequest, ManifestService};
use crate::validate::{parse_api_url, record_id, validate_wskey, ValidationError};

#[derive(Error, Debug)]
pub enum ManifestKitError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Not acceptable")]
    NotAcceptable,
    #[error("Precondition failed")]
    PreconditionFailed,
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Unexpected upstream status: {0}")]
    UpstreamStatus(u16),
    #[error("Manifest error: {0}")]
    ManifestError(String),
    #[error("Internal server error: {0}")]
    InternalError(String),
}

pub type Result<T> = std::result::Result<T, ManifestKitError>;

impl From<ValidationError> for ManifestKitError {
    fn from(e: ValidationError) -> Self {
        ManifestKitError::InvalidArgument(e.to_string())
    }
}

impl ManifestKitError {
    pub fn status(&self) -> StatusCode {
        match self {
            ManifestKitError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ManifestKitError::NotAcceptable => StatusCode::NOT_ACCEPTABLE,
            ManifestKitError::PreconditionFailed => StatusCode::PRECONDITION_FAILED,
            ManifestKitError::NetworkError(_)
            | ManifestKitError::UpstreamStatus(_)
            | ManifestKitError::ManifestError(_)
            | ManifestKitError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ManifestKitError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ManifestKitError::InvalidArgument(msg) => (status, msg).into_response(),
            ManifestKitError::NotAcceptable | ManifestKitError::PreconditionFailed => status.into_response(),
            other => {
                // Upstream detail stays in the logs
                tracing::error!("Manifest request failed: {}", other);
                (status, "Internal server error").into_response()
            }
        }
    }
}

/// Query parameters of the manifest route
#[derive(Debug, Deserialize)]
pub struct ManifestQuery {
    pub wskey: String,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default, rename = "recordApi")]
    pub record_api: Option<String>,
    #[serde(default, rename = "fullText")]
    pub full_text: Option<bool>,
    #[serde(default, rename = "fullTextApi")]
    pub full_text_api: Option<String>,
}

pub struct AppState {
    pub service: ManifestService,
}

fn header_str<'a>(headers: &'a HeaderMap, name: header::HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn build_request(
    collection_id: &str,
    record: &str,
    query: ManifestQuery,
    headers: &HeaderMap,
) -> Result<ManifestRequest> {
    let id = record_id(collection_id, record)?;
    validate_wskey(&query.wskey)?;
    let record_api = query.record_api.as_deref().map(parse_api_url).transpose()?;
    let full_text_api = query.full_text_api.as_deref().map(parse_api_url).transpose()?;

    let version = match negotiate_version(header_str(headers, header::ACCEPT), query.format.as_deref()) {
        Negotiation::Version(v) => v,
        Negotiation::NotAcceptable => return Err(ManifestKitError::NotAcceptable),
    };

    Ok(ManifestRequest {
        record_id: id,
        wskey: query.wskey,
        version,
        record_api,
        full_text: query.full_text.unwrap_or(true),
        full_text_api,
        conditions: ClientConditions::from_headers(headers),
    })
}

async fn manifest_handler(
    State(state): State<Arc<AppState>>,
    Path((collection_id, record)): Path<(String, String)>,
    Query(query): Query<ManifestQuery>,
    headers: HeaderMap,
) -> Response {
    METRICS.requests.fetch_add(1, Ordering::Relaxed);

    let request = match build_request(&collection_id, &record, query, &headers) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!("Rejected manifest request /{}/{}: {}", collection_id, record, e);
            METRICS.record(e.status());
            return e.into_response();
        }
    };

    tracing::debug!("Manifest request {} as version {}", request.record_id, request.version);
    match state.service.respond(&request).await {
        Ok(resp) => {
            tracing::info!("Manifest {} v{} -> {}", request.record_id, request.version, resp.status);
            METRICS.record(resp.status);
            resp.into_response()
        }
        Err(e) => {
            tracing::info!("Manifest {} v{} -> {}", request.record_id, request.version, e.status());
            METRICS.record(e.status());
            e.into_response()
        }
    }
}

// ====================================================================================
// OBSERVABILITY
// ====================================================================================

use std::sync::atomic::{AtomicU64, Ordering};

/// Global outcome counters
pub struct Metrics {
    pub requests: AtomicU64,
    pub ok: AtomicU64,
    pub not_modified: AtomicU64,
    pub bad_request: AtomicU64,
    pub not_acceptable: AtomicU64,
    pub precondition_failed: AtomicU64,
    pub errors: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            ok: AtomicU64::new(0),
            not_modified: AtomicU64::new(0),
            bad_request: AtomicU64::new(0),
            not_acceptable: AtomicU64::new(0),
            precondition_failed: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    fn record(&self, status: StatusCode) {
        let counter = match status {
            StatusCode::OK => &self.ok,
            StatusCode::NOT_MODIFIED => &self.not_modified,
            StatusCode::BAD_REQUEST => &self.bad_request,
            StatusCode::NOT_ACCEPTABLE => &self.not_acceptable,
            StatusCode::PRECONDITION_FAILED => &self.precondition_failed,
            _ => &self.errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

lazy_static::lazy_static! {
    static ref METRICS: Metrics = Metrics::new();
}

/// Health check endpoint
async fn health_handler() -> impl IntoResponse {
    use serde_json::json;

    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "manifestkit"
    }))
}

/// Metrics endpoint (Prometheus-compatible plain text)
async fn metrics_handler() -> impl IntoResponse {
    let counters = [
        ("manifestkit_requests_total", "Total number of manifest requests", &METRICS.requests),
        ("manifestkit_ok_total", "Manifests served with 200", &METRICS.ok),
        ("manifestkit_not_modified_total", "Conditional requests answered with 304", &METRICS.not_modified),
        ("manifestkit_bad_request_total", "Requests rejected by input validation", &METRICS.bad_request),
        ("manifestkit_not_acceptable_total", "Requests failing version negotiation", &METRICS.not_acceptable),
        ("manifestkit_precondition_failed_total", "Requests answered with 412", &METRICS.precondition_failed),
        ("manifestkit_errors_total", "Requests failing with 500", &METRICS.errors),
    ];

    let mut metrics = String::new();
    for (name, help, counter) in counters {
        metrics.push_str(&format!(
            "# HELP {name} {help}\n# TYPE {name} counter\n{name} {}\n",
            counter.load(Ordering::Relaxed)
        ));
    }

    (
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        metrics,
    )
}

/// Router backed by the record API client and JSON-LD builder from `config`.
pub fn router(config: ManifestKitConfig) -> Result<Router> {
    let source = Arc::new(RecordApiClient::new(&config)?);
    let builder = Arc::new(JsonLdManifestBuilder::new(
        config.manifest_base_url.clone(),
        config.full_text_api_url.clone(),
    ));
    Ok(router_with(&config, source, builder))
}

/// Router over explicit collaborators.
pub fn router_with(
    config: &ManifestKitConfig,
    source: Arc<dyn RecordSource>,
    builder: Arc<dyn ManifestBuilder>,
) -> Router {
    let state = Arc::new(AppState {
        service: ManifestService::new(source, builder),
    });

    // Observability endpoints - NO rate limiting
    let observability_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler));

    let mut manifest_routes = Router::new()
        .route("/presentation/:collection_id/:record_id/manifest", get(manifest_handler))
        .with_state(state);

    match config.rate_limit.and_then(|limit| {
        GovernorConfigBuilder::default()
            .per_second(limit.per_second)
            .burst_size(limit.burst_size)
            .finish()
            .map(|conf| (limit, conf))
    }) {
        Some((limit, governor_conf)) => {
            tracing::info!(
                "Router configured with rate limiting: {}/sec, burst {}",
                limit.per_second,
                limit.burst_size
            );
            manifest_routes = manifest_routes.layer(GovernorLayer {
                config: Box::leak(Box::new(governor_conf)),
            });
        }
        None => tracing::info!("Rate limiting disabled"),
    }

    Router::new()
        .merge(observability_routes)
        .merge(manifest_routes)
        .layer(TraceLayer::new_for_http())
}

use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use manifestkit::config::ManifestKitConfig;
use manifestkit::record::{OriginConditions, RecordApiClient, RecordRequest, RecordSource};
use manifestkit::ManifestKitError;
use std::collections::HashMap;
use std::net::SocketAddr;

const RECORD: &str = r#"{"object":{"about":"/1/2"}}"#;

/// Minimal record API: 304 when `If-None-Match` carries the current ETag,
/// 412 on a stale `If-Match`, 200 otherwise. Duplicate caching headers are
/// sent on purpose.
async fn record_api(headers: HeaderMap, axum::extract::Query(q): axum::extract::Query<HashMap<String, String>>) -> impl IntoResponse {
    if q.get("wskey").map(String::as_str) != Some("test") {
        return (StatusCode::UNAUTHORIZED, HeaderMap::new(), String::new());
    }
    let mut out = HeaderMap::new();
    out.append("etag", "\"rev-1\"".parse().unwrap());
    out.append("etag", "\"rev-0\"".parse().unwrap());
    out.append("last-modified", "Wed, 28 Oct 2015 07:28:00 GMT".parse().unwrap());
    if let Some(origin) = headers.get("origin") {
        out.insert("access-control-allow-methods", "GET, HEAD".parse().unwrap());
        out.insert("access-control-max-age", "1000".parse().unwrap());
        out.insert("x-echo-origin", origin.clone());
    }

    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    if header("if-none-match") == Some("\"rev-1\"") {
        return (StatusCode::NOT_MODIFIED, out, String::new());
    }
    if header("if-match").map_or(false, |v| v != "\"rev-1\"") {
        return (StatusCode::PRECONDITION_FAILED, HeaderMap::new(), String::new());
    }
    (StatusCode::OK, out, RECORD.to_string())
}

async fn spawn_origin() -> String {
    let app = Router::new().route("/api/:collection/:record", get(record_api));
    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/api", addr)
}

fn client(base: &str) -> RecordApiClient {
    let config = ManifestKitConfig { record_api_url: base.to_string(), ..Default::default() };
    RecordApiClient::new(&config).unwrap()
}

fn request(conditions: OriginConditions) -> RecordRequest {
    RecordRequest {
        record_id: "/1/2".into(),
        wskey: "test".into(),
        record_api: None,
        conditions,
    }
}

#[tokio::test]
async fn fetches_record_with_first_etag() {
    let base = spawn_origin().await;
    let resp = client(&base).fetch(&request(OriginConditions::default())).await.unwrap();

    assert_eq!(resp.status, 200);
    assert_eq!(resp.fingerprint, "\"rev-1\"");
    assert_eq!(resp.last_modified, "Wed, 28 Oct 2015 07:28:00 GMT");
    assert_eq!(&resp.body[..], RECORD.as_bytes());
    assert!(!resp.via_if_none_match);
    assert!(!resp.has_cors_headers());
}

#[tokio::test]
async fn forwards_if_none_match_and_origin() {
    let base = spawn_origin().await;
    let conditions = OriginConditions {
        if_none_match: Some("\"rev-1\"".into()),
        origin: Some("https://example.org".into()),
        ..Default::default()
    };
    let resp = client(&base).fetch(&request(conditions)).await.unwrap();

    assert_eq!(resp.status, 304);
    assert!(resp.via_if_none_match);
    assert!(resp.body.is_empty());
    assert_eq!(resp.fingerprint, "\"rev-1\"");
    assert_eq!(resp.allow_methods.as_deref(), Some("GET, HEAD"));
    assert_eq!(resp.max_age.as_deref(), Some("1000"));
}

#[tokio::test]
async fn reports_precondition_failure_as_status() {
    let base = spawn_origin().await;
    let conditions = OriginConditions { if_match: Some("\"rev-0\"".into()), ..Default::default() };
    let resp = client(&base).fetch(&request(conditions)).await.unwrap();
    assert_eq!(resp.status, 412);
}

#[tokio::test]
async fn record_api_override_is_used() {
    let base = spawn_origin().await;
    let mut req = request(OriginConditions::default());
    req.record_api = Some(base.parse().unwrap());
    req.wskey = "wrong".into();

    let resp = client("http://127.0.0.1:9/unused").fetch(&req).await.unwrap();
    assert_eq!(resp.status, 401);
}

#[tokio::test]
async fn oversized_record_is_a_network_error() {
    let base = spawn_origin().await;
    let config = ManifestKitConfig { record_api_url: base, max_record_size: 4, ..Default::default() };
    let err = RecordApiClient::new(&config)
        .unwrap()
        .fetch(&request(OriginConditions::default()))
        .await;
    assert!(matches!(err, Err(ManifestKitError::NetworkError(_))));
}

#[tokio::test]
async fn unreachable_origin_is_a_network_error() {
    let err = client("http://127.0.0.1:9/api").fetch(&request(OriginConditions::default())).await;
    assert!(matches!(err, Err(ManifestKitError::NetworkError(_))));
}

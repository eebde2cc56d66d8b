use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

use super::validator::encode_validator;
use crate::config::{DEFAULT_CACHE_CONTROL, DEFAULT_VARY};
use crate::origin::OriginResponse;

/// Caching headers for a manifest derived from `origin` as `version`.
///
/// The `ETag` is the composite validator of the origin fingerprint and the
/// version; `Last-Modified` is copied verbatim. Blank or non-encodable origin
/// values are left out rather than sent empty.
pub fn cache_headers(origin: &OriginResponse, version: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();

    if origin.fingerprint.is_empty() {
        tracing::warn!("Origin reply without ETag, omitting validator");
    } else if let Ok(value) = HeaderValue::from_str(&encode_validator(&origin.fingerprint, version)) {
        headers.insert(header::ETAG, value);
    }

    if !origin.last_modified.is_empty() {
        if let Ok(value) = HeaderValue::from_str(&origin.last_modified) {
            headers.insert(header::LAST_MODIFIED, value);
        }
    }

    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(DEFAULT_CACHE_CONTROL));
    headers.insert(header::VARY, HeaderValue::from_static(DEFAULT_VARY));
    headers
}

/// Copies the origin's CORS headers that are present.
pub fn cors_headers(origin: &OriginResponse, headers: &mut HeaderMap) {
    let pairs: [(HeaderName, &Option<String>); 4] = [
        (header::ACCESS_CONTROL_ALLOW_METHODS, &origin.allow_methods),
        (header::ACCESS_CONTROL_ALLOW_HEADERS, &origin.allow_headers),
        (header::ACCESS_CONTROL_EXPOSE_HEADERS, &origin.expose_headers),
        (header::ACCESS_CONTROL_MAX_AGE, &origin.max_age),
    ];
    for (name, value) in pairs {
        if let Some(value) = value.as_deref().and_then(|v| HeaderValue::from_str(v).ok()) {
            headers.insert(name, value);
        }
    }
}

/// Full header set of a 200 reply: caching headers plus CORS.
pub fn response_headers(origin: &OriginResponse, version: &str) -> HeaderMap {
    let mut headers = cache_headers(origin, version);
    cors_headers(origin, &mut headers);
    headers
}

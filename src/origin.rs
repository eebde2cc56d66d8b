//! Snapshot of one record API reply.

use bytes::Bytes;

/// Status, caching and CORS headers of an origin reply.
///
/// Built once per request and read by the orchestrator. For each header of
/// interest the first non-blank occurrence wins (names compared
/// case-insensitively) and later duplicates are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OriginResponse {
    pub status: u16,
    /// Native origin ETag, not yet composed with a manifest version.
    pub fingerprint: String,
    /// Opaque `Last-Modified` text as sent by the origin.
    pub last_modified: String,
    pub cache_control: Option<String>,
    pub allow_methods: Option<String>,
    pub allow_headers: Option<String>,
    pub expose_headers: Option<String>,
    pub max_age: Option<String>,
    /// Set when the origin was queried with an `If-None-Match` value.
    pub via_if_none_match: bool,
    pub body: Bytes,
}

impl OriginResponse {
    /// Scans `headers` in order, keeping the first non-blank value of each
    /// header of interest.
    pub fn from_parts<'a, I>(status: u16, headers: I, body: Bytes, via_if_none_match: bool) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut fingerprint = None;
        let mut last_modified = None;
        let mut cache_control = None;
        let mut allow_methods = None;
        let mut allow_headers = None;
        let mut expose_headers = None;
        let mut max_age = None;

        for (name, value) in headers {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            let slot = match name.to_ascii_lowercase().as_str() {
                "etag" => &mut fingerprint,
                "last-modified" => &mut last_modified,
                "cache-control" => &mut cache_control,
                "access-control-allow-methods" => &mut allow_methods,
                "access-control-allow-headers" => &mut allow_headers,
                "access-control-expose-headers" => &mut expose_headers,
                "access-control-max-age" => &mut max_age,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.to_string());
            }
        }

        Self {
            status,
            fingerprint: fingerprint.unwrap_or_default(),
            last_modified: last_modified.unwrap_or_default(),
            cache_control,
            allow_methods,
            allow_headers,
            expose_headers,
            max_age,
            via_if_none_match,
            body,
        }
    }

    /// Builds the model from a `reqwest` reply's status and headers.
    pub fn from_reqwest(
        status: reqwest::StatusCode,
        headers: &reqwest::header::HeaderMap,
        body: Bytes,
        via_if_none_match: bool,
    ) -> Self {
        let pairs = headers
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v)));
        Self::from_parts(status.as_u16(), pairs, body, via_if_none_match)
    }

    pub fn has_cors_headers(&self) -> bool {
        self.allow_methods.is_some()
            || self.allow_headers.is_some()
            || self.expose_headers.is_some()
            || self.max_age.is_some()
    }
}

//! Request orchestration: decides which conditional values reach the record
//! API and maps its reply onto the client response.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use reqwest::Url;

use crate::cache::{cache_headers, is_wildcard, match_validator, response_headers, MatchResult, WILDCARD};
use crate::config::ManifestVersion;
use crate::manifest::ManifestBuilder;
use crate::origin::OriginResponse;
use crate::record::{OriginConditions, RecordRequest, RecordSource};
use crate::{ManifestKitError, Result};

/// Conditional request headers as received from the client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientConditions {
    pub if_none_match: Option<String>,
    pub if_match: Option<String>,
    pub if_modified_since: Option<String>,
    pub origin: Option<String>,
}

impl ClientConditions {
    /// Reads the conditional headers; blank values count as absent.
    ///
    /// Repeated `If-None-Match` / `If-Match` lines are joined into one
    /// comma-separated list.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let values = |name: header::HeaderName| {
            headers
                .get_all(name)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .collect::<Vec<_>>()
        };
        let list = |name: header::HeaderName| {
            let values = values(name);
            (!values.is_empty()).then(|| values.join(", "))
        };
        let first = |name: header::HeaderName| values(name).first().map(|v| v.to_string());

        Self {
            if_none_match: list(header::IF_NONE_MATCH),
            if_match: list(header::IF_MATCH),
            if_modified_since: first(header::IF_MODIFIED_SINCE),
            origin: first(header::ORIGIN),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Query(OriginConditions),
    /// `If-Match` named no validator for this version; the origin is not asked.
    PreconditionFailed,
}

/// Chooses the conditional values to forward for `version`.
///
/// `If-None-Match` takes precedence over `If-Match`. `Origin` is forwarded on
/// every path that queries the origin.
pub fn plan_origin_query(conditions: &ClientConditions, version: ManifestVersion) -> Dispatch {
    let origin = conditions.origin.clone();

    if let Some(inm) = conditions.if_none_match.as_deref() {
        if is_wildcard(inm) {
            return Dispatch::Query(OriginConditions {
                if_none_match: Some(WILDCARD.into()),
                if_match: None,
                if_modified_since: conditions.if_modified_since.clone(),
                origin,
            });
        }
        return match match_validator(inm, version.token()) {
            MatchResult::Found(fingerprint) => {
                tracing::debug!("If-None-Match matched version {}", version);
                Dispatch::Query(OriginConditions {
                    if_none_match: Some(fingerprint),
                    origin,
                    ..Default::default()
                })
            }
            // Unknown or foreign validators: ask for a fresh record
            MatchResult::NotFound | MatchResult::Undecodable => {
                Dispatch::Query(OriginConditions { origin, ..Default::default() })
            }
        };
    }

    if let Some(im) = conditions.if_match.as_deref() {
        if is_wildcard(im) {
            return Dispatch::Query(OriginConditions {
                if_match: Some(WILDCARD.into()),
                origin,
                ..Default::default()
            });
        }
        return match match_validator(im, version.token()) {
            MatchResult::Found(fingerprint) => Dispatch::Query(OriginConditions {
                if_match: Some(fingerprint),
                origin,
                ..Default::default()
            }),
            MatchResult::NotFound | MatchResult::Undecodable => {
                tracing::debug!("If-Match has no validator for version {}", version);
                Dispatch::PreconditionFailed
            }
        };
    }

    Dispatch::Query(OriginConditions {
        if_modified_since: conditions.if_modified_since.clone(),
        origin,
        ..Default::default()
    })
}

/// Client-facing reply before conversion into an axum response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Option<String>,
}

impl ManifestResponse {
    pub fn bare(status: StatusCode) -> Self {
        Self { status, headers: HeaderMap::new(), body: None }
    }
}

impl IntoResponse for ManifestResponse {
    fn into_response(self) -> Response {
        let body = self.body.map(Body::from).unwrap_or_else(Body::empty);
        (self.status, self.headers, body).into_response()
    }
}

/// Everything the orchestrator needs from one validated request.
#[derive(Debug, Clone)]
pub struct ManifestRequest {
    pub record_id: String,
    pub wskey: String,
    pub version: ManifestVersion,
    pub record_api: Option<Url>,
    pub full_text: bool,
    pub full_text_api: Option<Url>,
    pub conditions: ClientConditions,
}

pub struct ManifestService {
    source: Arc<dyn RecordSource>,
    builder: Arc<dyn ManifestBuilder>,
}

impl ManifestService {
    pub fn new(source: Arc<dyn RecordSource>, builder: Arc<dyn ManifestBuilder>) -> Self {
        Self { source, builder }
    }

    /// Runs one manifest request, calling the origin at most once.
    pub async fn respond(&self, request: &ManifestRequest) -> Result<ManifestResponse> {
        let conditions = match plan_origin_query(&request.conditions, request.version) {
            Dispatch::PreconditionFailed => return Err(ManifestKitError::PreconditionFailed),
            Dispatch::Query(conditions) => conditions,
        };

        let origin = self
            .source
            .fetch(&RecordRequest {
                record_id: request.record_id.clone(),
                wskey: request.wskey.clone(),
                record_api: request.record_api.clone(),
                conditions,
            })
            .await?;

        self.assemble_response(&origin, request)
    }

    /// Maps the origin reply onto the client response.
    pub fn assemble_response(&self, origin: &OriginResponse, request: &ManifestRequest) -> Result<ManifestResponse> {
        let version = request.version;
        match origin.status {
            304 if origin.via_if_none_match => Ok(ManifestResponse {
                status: StatusCode::NOT_MODIFIED,
                headers: cache_headers(origin, version.token()),
                body: None,
            }),
            // If-Modified-Since revalidation answers without headers
            304 => Ok(ManifestResponse::bare(StatusCode::NOT_MODIFIED)),
            412 => Err(ManifestKitError::PreconditionFailed),
            200 => {
                let manifest = self.builder.build(
                    &origin.body,
                    version,
                    request.full_text,
                    request.full_text_api.as_ref(),
                )?;
                let body = self.builder.serialize(&manifest)?;

                let mut headers = response_headers(origin, version.token());
                let content_type = HeaderValue::from_str(&version.content_type())
                    .map_err(|e| ManifestKitError::InternalError(e.to_string()))?;
                headers.insert(header::CONTENT_TYPE, content_type);
                Ok(ManifestResponse { status: StatusCode::OK, headers, body: Some(body) })
            }
            status => Err(ManifestKitError::UpstreamStatus(status)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::encode_validator;

    fn conditions() -> ClientConditions {
        ClientConditions { origin: Some("https://example.org".into()), ..Default::default() }
    }

    #[test]
    fn repeated_validator_lines_are_joined() {
        let mut headers = HeaderMap::new();
        headers.append(header::IF_NONE_MATCH, HeaderValue::from_static("W/\"a\""));
        headers.append(header::IF_NONE_MATCH, HeaderValue::from_static("  "));
        headers.append(header::IF_NONE_MATCH, HeaderValue::from_static("W/\"b\""));
        headers.insert(header::ORIGIN, HeaderValue::from_static("https://example.org"));

        let c = ClientConditions::from_headers(&headers);
        assert_eq!(c.if_none_match.as_deref(), Some("W/\"a\", W/\"b\""));
        assert_eq!(c.origin.as_deref(), Some("https://example.org"));
        assert!(c.if_match.is_none());
    }

    #[test]
    fn no_conditions_forwards_origin_only() {
        let plan = plan_origin_query(&conditions(), ManifestVersion::V2);
        assert_eq!(
            plan,
            Dispatch::Query(OriginConditions { origin: Some("https://example.org".into()), ..Default::default() })
        );
    }

    #[test]
    fn if_modified_since_is_forwarded_alone() {
        let c = ClientConditions {
            if_modified_since: Some("Tue, 12 Jul 2016 11:07:32 GMT".into()),
            ..conditions()
        };
        let Dispatch::Query(q) = plan_origin_query(&c, ManifestVersion::V2) else { panic!("expected query") };
        assert_eq!(q.if_modified_since.as_deref(), Some("Tue, 12 Jul 2016 11:07:32 GMT"));
        assert!(q.if_none_match.is_none() && q.if_match.is_none());
    }

    #[test]
    fn wildcard_if_none_match_keeps_if_modified_since() {
        let c = ClientConditions {
            if_none_match: Some("*".into()),
            if_modified_since: Some("Tue, 12 Jul 2016 11:07:32 GMT".into()),
            ..conditions()
        };
        let Dispatch::Query(q) = plan_origin_query(&c, ManifestVersion::V3) else { panic!("expected query") };
        assert_eq!(q.if_none_match.as_deref(), Some("*"));
        assert!(q.if_modified_since.is_some());
        assert_eq!(q.origin.as_deref(), Some("https://example.org"));
    }

    #[test]
    fn matching_if_none_match_forwards_fingerprint() {
        let c = ClientConditions {
            if_none_match: Some(encode_validator("W/\"abc\"", "3")),
            if_match: Some(encode_validator("ignored", "3")),
            ..conditions()
        };
        let Dispatch::Query(q) = plan_origin_query(&c, ManifestVersion::V3) else { panic!("expected query") };
        assert_eq!(q.if_none_match.as_deref(), Some("W/\"abc\""));
        assert!(q.if_match.is_none());
    }

    #[test]
    fn foreign_if_none_match_drops_all_conditions() {
        let c = ClientConditions {
            if_none_match: Some(encode_validator("abc", "2")),
            if_modified_since: Some("Tue, 12 Jul 2016 11:07:32 GMT".into()),
            ..conditions()
        };
        assert_eq!(plan_origin_query(&c, ManifestVersion::V3), plan_origin_query(&conditions(), ManifestVersion::V3));
    }

    #[test]
    fn if_match_for_other_version_fails_precondition() {
        let c = ClientConditions { if_match: Some(encode_validator("abc", "2")), ..conditions() };
        assert_eq!(plan_origin_query(&c, ManifestVersion::V3), Dispatch::PreconditionFailed);

        let c = ClientConditions { if_match: Some("W/\"garbage\"".into()), ..conditions() };
        assert_eq!(plan_origin_query(&c, ManifestVersion::V3), Dispatch::PreconditionFailed);
    }

    #[test]
    fn if_match_wildcard_and_match() {
        let c = ClientConditions { if_match: Some("*".into()), ..conditions() };
        let Dispatch::Query(q) = plan_origin_query(&c, ManifestVersion::V2) else { panic!("expected query") };
        assert_eq!(q.if_match.as_deref(), Some("*"));

        let c = ClientConditions { if_match: Some(encode_validator("abc", "2")), ..conditions() };
        let Dispatch::Query(q) = plan_origin_query(&c, ManifestVersion::V2) else { panic!("expected query") };
        assert_eq!(q.if_match.as_deref(), Some("abc"));
    }
}

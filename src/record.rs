use async_trait::async_trait;
use bytes::BytesMut;
use futures::StreamExt;
use reqwest::{header, Client, StatusCode, Url};

use crate::config::ManifestKitConfig;
use crate::origin::OriginResponse;
use crate::{ManifestKitError, Result};

/// One record lookup, with the conditional values to forward upstream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordRequest {
    /// `/{collectionId}/{recordId}`
    pub record_id: String,
    pub wskey: String,
    pub record_api: Option<Url>,
    pub conditions: OriginConditions,
}

/// Conditional and CORS request headers sent to the origin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OriginConditions {
    pub if_none_match: Option<String>,
    pub if_match: Option<String>,
    pub if_modified_since: Option<String>,
    pub origin: Option<String>,
}

/// Source of record data. Any HTTP status is reported through
/// [`OriginResponse::status`]; only transport failures are errors.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn fetch(&self, request: &RecordRequest) -> Result<OriginResponse>;
}

/// Record API client over `reqwest`.
pub struct RecordApiClient {
    client: Client,
    base_url: String,
    max_record_size: usize,
}

impl RecordApiClient {
    pub fn new(config: &ManifestKitConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ManifestKitError::InternalError(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.record_api_url.clone(),
            max_record_size: config.max_record_size,
        })
    }

    /// `{base}{recordId}.json?wskey=…`
    pub fn record_url(&self, request: &RecordRequest) -> Result<String> {
        let base = request
            .record_api
            .as_ref()
            .map(Url::as_str)
            .unwrap_or(self.base_url.as_str())
            .trim_end_matches('/');
        let query = serde_urlencoded::to_string([("wskey", request.wskey.as_str())])
            .map_err(|e| ManifestKitError::InvalidArgument(e.to_string()))?;
        Ok(format!("{}{}.json?{}", base, request.record_id, query))
    }

    async fn read_body(&self, resp: reqwest::Response) -> Result<bytes::Bytes> {
        if let Some(len) = resp.content_length() {
            if len > self.max_record_size as u64 {
                return Err(ManifestKitError::NetworkError("Record exceeds size limit".into()));
            }
        }

        // Enforce the limit while streaming in case Content-Length lies
        let mut buf = BytesMut::with_capacity(8192);
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream
            .next()
            .await
            .transpose()
            .map_err(|e| ManifestKitError::NetworkError(e.to_string()))?
        {
            if buf.len() + chunk.len() > self.max_record_size {
                return Err(ManifestKitError::NetworkError("Record exceeds size limit".into()));
            }
            buf.extend_from_slice(&chunk);
        }
        Ok(buf.freeze())
    }
}

#[async_trait]
impl RecordSource for RecordApiClient {
    async fn fetch(&self, request: &RecordRequest) -> Result<OriginResponse> {
        let url = self.record_url(request)?;
        let conditions = &request.conditions;

        let mut builder = self.client.get(&url);
        for (name, value) in [
            (header::IF_NONE_MATCH, &conditions.if_none_match),
            (header::IF_MATCH, &conditions.if_match),
            (header::IF_MODIFIED_SINCE, &conditions.if_modified_since),
            (header::ORIGIN, &conditions.origin),
        ] {
            if let Some(value) = value {
                builder = builder.header(name, value.as_str());
            }
        }

        tracing::debug!("Querying record API for {}", request.record_id);
        let resp = builder
            .send()
            .await
            .map_err(|e| ManifestKitError::NetworkError(e.to_string()))?;

        let status = resp.status();
        let headers = resp.headers().clone();
        let body = if status == StatusCode::OK {
            self.read_body(resp).await?
        } else {
            bytes::Bytes::new()
        };
        tracing::debug!("Record API answered {} for {}", status, request.record_id);

        Ok(OriginResponse::from_reqwest(
            status,
            &headers,
            body,
            conditions.if_none_match.is_some(),
        ))
    }
}

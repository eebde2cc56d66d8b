use reqwest::Url;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing API key")] MissingKey,
    #[error("invalid API key format")] InvalidKey,
    #[error("invalid record identifier: {0}")] InvalidRecordId(String),
    #[error("invalid API URL: {0}")] InvalidApiUrl(String),
}

pub fn validate_wskey(wskey: &str) -> Result<(), ValidationError> {
    if wskey.is_empty() { return Err(ValidationError::MissingKey); }
    if !wskey.chars().all(|c| c.is_ascii_alphanumeric()) { return Err(ValidationError::InvalidKey); }
    Ok(())
}

fn valid_segment(segment: &str) -> bool {
    !segment.is_empty() && segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Builds `/{collectionId}/{recordId}` after checking both segments.
pub fn record_id(collection_id: &str, record_id: &str) -> Result<String, ValidationError> {
    let id = format!("/{}/{}", collection_id, record_id);
    if valid_segment(collection_id) && valid_segment(record_id) { Ok(id) } else { Err(ValidationError::InvalidRecordId(id)) }
}

pub fn parse_api_url(raw: &str) -> Result<Url, ValidationError> {
    let url = Url::parse(raw).map_err(|_| ValidationError::InvalidApiUrl(raw.to_string()))?;
    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url),
        _ => Err(ValidationError::InvalidApiUrl(raw.to_string())),
    }
}

use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use thiserror::Error;

/// Separator written between fingerprint and version when encoding.
pub const ENCODE_SEPARATOR: char = '|';

/// Separators accepted when decoding, in priority order. Older producers
/// used `,` or a space instead of `|`.
const DECODE_SEPARATORS: [char; 3] = ['|', ',', ' '];

const WEAK_PREFIX: &str = "W/";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidatorError {
    #[error("validator is not valid base64")]
    Encoding,
    #[error("validator payload is not UTF-8")]
    Utf8,
    #[error("validator payload has no separator")]
    MissingSeparator,
    #[error("validator payload has an empty component")]
    EmptyComponent,
}

/// Origin fingerprint bound to the manifest version it was served as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeValidator {
    pub fingerprint: String,
    pub version: String,
}

impl CompositeValidator {
    pub fn new(fingerprint: impl Into<String>, version: impl Into<String>) -> Self {
        Self { fingerprint: fingerprint.into(), version: version.into() }
    }

    pub fn encode(&self) -> String {
        encode_validator(&self.fingerprint, &self.version)
    }
}

/// Builds the weak wire ETag `W/"BASE64(fingerprint|version)"`.
pub fn encode_validator(fingerprint: &str, version: &str) -> String {
    let contents = format!("{}{}{}", fingerprint, ENCODE_SEPARATOR, version);
    format!("{}\"{}\"", WEAK_PREFIX, BASE64_STANDARD.encode(contents.as_bytes()))
}

/// Removes a leading weak marker and every double quote.
pub fn strip_validator(raw: &str) -> &str {
    let raw = raw.trim();
    let raw = raw.strip_prefix(WEAK_PREFIX).unwrap_or(raw);
    raw.trim_matches('"')
}

/// Reverses [`encode_validator`].
///
/// Accepts the wire form with or without weak marker and quotes. The decoded
/// payload is split on the first separator kind present (`|`, then `,`, then
/// space); a payload with none of them was never produced by an encoder.
pub fn decode_validator(wire: &str) -> Result<CompositeValidator, ValidatorError> {
    let bytes = BASE64_STANDARD
        .decode(strip_validator(wire))
        .map_err(|_| ValidatorError::Encoding)?;
    let decoded = String::from_utf8(bytes).map_err(|_| ValidatorError::Utf8)?;

    let separator = DECODE_SEPARATORS
        .iter()
        .copied()
        .find(|sep| decoded.contains(*sep))
        .ok_or(ValidatorError::MissingSeparator)?;

    let (fingerprint, version) = decoded
        .split_once(separator)
        .ok_or(ValidatorError::MissingSeparator)?;
    if fingerprint.is_empty() || version.is_empty() {
        return Err(ValidatorError::EmptyComponent);
    }
    Ok(CompositeValidator::new(fingerprint, version))
}

//! Matching of `If-None-Match` / `If-Match` values against the current
//! manifest version.

use super::validator::{decode_validator, strip_validator};

/// Wildcard entity tag matching any current representation.
pub const WILDCARD: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    /// Origin fingerprint of the first validator issued for the current version.
    Found(String),
    NotFound,
    /// A listed validator could not be decoded; scanning stopped there.
    Undecodable,
}

/// `true` when the header value is the bare `*` token.
pub fn is_wildcard(header: &str) -> bool {
    strip_validator(header) == WILDCARD
}

/// Scans a comma-separated list of composite validators for one issued for
/// `current_version` (compared case-insensitively).
///
/// The first token that fails to decode ends the scan with
/// [`MatchResult::Undecodable`], even when a later token would have matched.
pub fn match_validator(header: &str, current_version: &str) -> MatchResult {
    for token in header.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match decode_validator(token) {
            Ok(validator) => {
                if validator.version.eq_ignore_ascii_case(current_version) {
                    return MatchResult::Found(validator.fingerprint);
                }
            }
            Err(e) => {
                tracing::warn!("Undecodable validator {:?}: {}", token, e);
                return MatchResult::Undecodable;
            }
        }
    }
    MatchResult::NotFound
}

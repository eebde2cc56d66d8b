//! Manifest version negotiation from the `Accept` header and the `format`
//! query parameter.

use mime::Mime;

use crate::config::{ManifestVersion, IIIF_V2_CONTEXT, IIIF_V3_CONTEXT, MEDIA_TYPE_JSON, MEDIA_TYPE_JSONLD};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Negotiation {
    Version(ManifestVersion),
    NotAcceptable,
}

/// Outcome of inspecting the `Accept` header alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AcceptOutcome {
    Version(ManifestVersion),
    NotAcceptable,
    Unresolved,
}

/// Resolves the manifest version for one request.
///
/// A quoted `profile="…"` in an acceptable `Accept` header takes precedence,
/// then the `format` parameter, then version 2. An unrecognised `format`
/// also falls back to version 2.
pub fn negotiate_version(accept: Option<&str>, format: Option<&str>) -> Negotiation {
    match inspect_accept(accept) {
        AcceptOutcome::Version(v) => Negotiation::Version(v),
        AcceptOutcome::NotAcceptable => Negotiation::NotAcceptable,
        AcceptOutcome::Unresolved => match format.map(str::trim).filter(|f| !f.is_empty()) {
            None => Negotiation::Version(ManifestVersion::default()),
            Some(token) => match ManifestVersion::from_token(token) {
                Some(version) => Negotiation::Version(version),
                None => {
                    tracing::warn!("Unknown format {:?}, serving version {}", token, ManifestVersion::default());
                    Negotiation::Version(ManifestVersion::default())
                }
            },
        },
    }
}

fn inspect_accept(accept: Option<&str>) -> AcceptOutcome {
    let accept = match accept.map(str::trim).filter(|a| !a.is_empty()) {
        Some(a) => a,
        None => return AcceptOutcome::Unresolved,
    };
    if !is_acceptable_media_type(accept) {
        return AcceptOutcome::NotAcceptable;
    }
    match quoted_profile(accept) {
        None => AcceptOutcome::Unresolved,
        Some(profile) => {
            let profile = profile.to_ascii_lowercase();
            if profile.contains(IIIF_V3_CONTEXT) {
                AcceptOutcome::Version(ManifestVersion::V3)
            } else if profile.contains(IIIF_V2_CONTEXT) {
                AcceptOutcome::Version(ManifestVersion::V2)
            } else {
                AcceptOutcome::NotAcceptable
            }
        }
    }
}

fn is_acceptable_media_type(accept: &str) -> bool {
    accept
        .split(',')
        .filter_map(|range| range.trim().parse::<Mime>().ok())
        .any(|m| {
            let essence = m.essence_str();
            essence == "*/*" || essence == MEDIA_TYPE_JSON || essence == MEDIA_TYPE_JSONLD
        })
}

/// Value of the first `profile="…"` parameter; unquoted profiles don't count.
fn quoted_profile(accept: &str) -> Option<&str> {
    const KEY: &str = "profile=\"";
    let start = accept.to_ascii_lowercase().find(KEY)? + KEY.len();
    let rest = &accept[start..];
    let end = rest.find('"')?;
    Some(&rest[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(version: ManifestVersion) -> Negotiation {
        Negotiation::Version(version)
    }

    #[test]
    fn defaults_to_v2() {
        assert_eq!(negotiate_version(None, None), v(ManifestVersion::V2));
        assert_eq!(negotiate_version(Some("  "), Some("")), v(ManifestVersion::V2));
    }

    #[test]
    fn profile_selects_version() {
        let accept = format!("application/ld+json; profile=\"{}\"", IIIF_V3_CONTEXT);
        assert_eq!(negotiate_version(Some(&accept), None), v(ManifestVersion::V3));

        let accept = format!("application/json;profile=\"{}\"", IIIF_V2_CONTEXT);
        assert_eq!(negotiate_version(Some(&accept), Some("3")), v(ManifestVersion::V2));
    }

    #[test]
    fn unknown_profile_is_not_acceptable() {
        let accept = "application/json; profile=\"http://example.org/unknown\"";
        assert_eq!(negotiate_version(Some(accept), None), Negotiation::NotAcceptable);
    }

    #[test]
    fn unquoted_profile_is_ignored() {
        assert_eq!(negotiate_version(Some("application/json;profile=X"), None), v(ManifestVersion::V2));
    }

    #[test]
    fn unsupported_media_type_is_not_acceptable() {
        assert_eq!(negotiate_version(Some("application/xml"), None), Negotiation::NotAcceptable);
        assert_eq!(negotiate_version(Some("application/xml"), Some("3")), Negotiation::NotAcceptable);
    }

    #[test]
    fn wildcard_accept_uses_format() {
        assert_eq!(negotiate_version(Some("*/*"), Some("3")), v(ManifestVersion::V3));
        assert_eq!(
            negotiate_version(Some("text/html, application/ld+json"), None),
            v(ManifestVersion::V2)
        );
    }

    #[test]
    fn unknown_format_serves_default_version() {
        assert_eq!(negotiate_version(None, Some("5")), v(ManifestVersion::V2));
        assert_eq!(negotiate_version(Some("*/*"), Some("v3")), v(ManifestVersion::V2));
    }
}

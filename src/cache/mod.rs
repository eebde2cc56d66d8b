// Conditional-request caching: composite validators, header matching and
// outbound cache headers.
pub mod headers;
pub mod matcher;
pub mod validator;

pub use headers::{cache_headers, cors_headers, response_headers};
pub use matcher::{is_wildcard, match_validator, MatchResult, WILDCARD};
pub use validator::{decode_validator, encode_validator, strip_validator, CompositeValidator, ValidatorError};

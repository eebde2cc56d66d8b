use reqwest::Url;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CACHE_CONTROL: &str = "no-cache";
pub const DEFAULT_VARY: &str = "Accept";

pub const MEDIA_TYPE_JSON: &str = "application/json";
pub const MEDIA_TYPE_JSONLD: &str = "application/ld+json";
pub const IIIF_V2_CONTEXT: &str = "http://iiif.io/api/presentation/2/context.json";
pub const IIIF_V3_CONTEXT: &str = "http://iiif.io/api/presentation/3/context.json";

pub const DEFAULT_RECORD_API: &str = "https://api.europeana.eu/record/v2";
pub const DEFAULT_FULLTEXT_API: &str = "https://www.europeana.eu/api/fulltext";
pub const DEFAULT_BASE_URL: &str = "https://iiif.europeana.eu";

/// Output format version of a manifest.
///
/// Resolved once per request and carried as a plain value; the composite
/// ETag embeds its token so caches keep v2 and v3 representations apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManifestVersion {
    V2,
    V3,
}

impl ManifestVersion {
    pub fn token(&self) -> &'static str {
        match self {
            ManifestVersion::V2 => "2",
            ManifestVersion::V3 => "3",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim() {
            "2" => Some(ManifestVersion::V2),
            "3" => Some(ManifestVersion::V3),
            _ => None,
        }
    }

    pub fn context(&self) -> &'static str {
        match self {
            ManifestVersion::V2 => IIIF_V2_CONTEXT,
            ManifestVersion::V3 => IIIF_V3_CONTEXT,
        }
    }

    /// `Content-Type` value carrying the version profile
    pub fn content_type(&self) -> String {
        format!("{};profile=\"{}\"", MEDIA_TYPE_JSONLD, self.context())
    }
}

impl Default for ManifestVersion {
    fn default() -> Self {
        ManifestVersion::V2
    }
}

impl std::fmt::Display for ManifestVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.token())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub per_second: u64,
    pub burst_size: u32,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self { per_second: 10, burst_size: 30 }
    }
}

#[derive(Debug, Clone)]
pub struct ManifestKitConfig {
    pub record_api_url: String,
    pub full_text_api_url: String,
    pub manifest_base_url: String,
    pub request_timeout: Duration,
    pub max_record_size: usize, // bytes
    pub rate_limit: Option<RateLimit>,
}

impl Default for ManifestKitConfig {
    fn default() -> Self {
        Self {
            record_api_url: DEFAULT_RECORD_API.into(),
            full_text_api_url: DEFAULT_FULLTEXT_API.into(),
            manifest_base_url: DEFAULT_BASE_URL.into(),
            request_timeout: Duration::from_secs(10),
            max_record_size: 16 * 1024 * 1024,
            rate_limit: Some(RateLimit::default()),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid URL for {0}: {1}")] InvalidUrl(&'static str, String),
    #[error("Max record size must be > 0")] InvalidMaxRecord,
    #[error("Request timeout must be > 0")] InvalidTimeout,
    #[error("Invalid value for {0}: {1}")] InvalidEnv(&'static str, String),
}

impl ManifestKitConfig {
    /// Reads overrides from the environment, keeping defaults for unset variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        if let Ok(v) = std::env::var("MANIFESTKIT_RECORD_API") { cfg.record_api_url = v; }
        if let Ok(v) = std::env::var("MANIFESTKIT_FULLTEXT_API") { cfg.full_text_api_url = v; }
        if let Ok(v) = std::env::var("MANIFESTKIT_BASE_URL") { cfg.manifest_base_url = v; }
        if let Ok(v) = std::env::var("MANIFESTKIT_TIMEOUT_SECS") {
            let secs = v
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidEnv("MANIFESTKIT_TIMEOUT_SECS", v.clone()))?;
            cfg.request_timeout = Duration::from_secs(secs);
        }
        if std::env::var("DISABLE_RATE_LIMIT").is_ok() { cfg.rate_limit = None; }
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("record_api_url", &self.record_api_url),
            ("full_text_api_url", &self.full_text_api_url),
            ("manifest_base_url", &self.manifest_base_url),
        ] {
            Url::parse(value).map_err(|e| ConfigError::InvalidUrl(name, e.to_string()))?;
        }
        if self.max_record_size == 0 { return Err(ConfigError::InvalidMaxRecord); }
        if self.request_timeout.is_zero() { return Err(ConfigError::InvalidTimeout); }
        Ok(())
    }
}

use reqwest::Url;
use serde_json::{json, Value};

use crate::config::ManifestVersion;
use crate::{ManifestKitError, Result};

/// Turns record JSON into a serialisable manifest for one version.
pub trait ManifestBuilder: Send + Sync {
    fn build(
        &self,
        record_json: &[u8],
        version: ManifestVersion,
        add_full_text: bool,
        full_text_api: Option<&Url>,
    ) -> Result<Value>;

    fn serialize(&self, manifest: &Value) -> Result<String> {
        serde_json::to_string_pretty(manifest).map_err(|e| ManifestKitError::ManifestError(e.to_string()))
    }
}

/// Builds a minimal IIIF presentation manifest skeleton.
///
/// Only identity fields are mapped (`object.about` and the first
/// `object.title`); the record's web resources are not turned into canvases.
#[derive(Debug, Clone)]
pub struct JsonLdManifestBuilder {
    base_url: String,
    full_text_api: String,
}

impl JsonLdManifestBuilder {
    pub fn new(base_url: impl Into<String>, full_text_api: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), full_text_api: full_text_api.into() }
    }

    fn manifest_id(&self, about: &str) -> String {
        format!("{}/presentation{}/manifest", self.base_url.trim_end_matches('/'), about)
    }

    fn search_id(&self, about: &str, full_text_api: Option<&Url>) -> String {
        let base = full_text_api.map(Url::as_str).unwrap_or(self.full_text_api.as_str());
        format!("{}/presentation{}/search", base.trim_end_matches('/'), about)
    }
}

impl ManifestBuilder for JsonLdManifestBuilder {
    fn build(
        &self,
        record_json: &[u8],
        version: ManifestVersion,
        add_full_text: bool,
        full_text_api: Option<&Url>,
    ) -> Result<Value> {
        let record: Value = serde_json::from_slice(record_json)
            .map_err(|e| ManifestKitError::ManifestError(format!("Invalid record JSON: {}", e)))?;
        let object = &record["object"];
        let about = object["about"]
            .as_str()
            .ok_or_else(|| ManifestKitError::ManifestError("Record has no object.about".into()))?;
        let title = object["title"][0].as_str();
        let id = self.manifest_id(about);

        let mut manifest = match version {
            ManifestVersion::V2 => json!({
                "@context": version.context(),
                "@id": id,
                "@type": "sc:Manifest",
            }),
            ManifestVersion::V3 => json!({
                "@context": version.context(),
                "id": id,
                "type": "Manifest",
            }),
        };

        if let Some(title) = title {
            manifest["label"] = match version {
                ManifestVersion::V2 => json!(title),
                ManifestVersion::V3 => json!({ "none": [title] }),
            };
        }

        if add_full_text {
            let search = self.search_id(about, full_text_api);
            manifest["service"] = match version {
                ManifestVersion::V2 => json!({
                    "@context": "http://iiif.io/api/search/1/context.json",
                    "@id": search,
                    "profile": "http://iiif.io/api/search/1/search",
                }),
                ManifestVersion::V3 => json!([{
                    "id": search,
                    "type": "SearchService1",
                    "profile": "http://iiif.io/api/search/1/search",
                }]),
            };
        }

        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORD: &[u8] = br#"{ "object": { "about": "/1/2", "title": ["Een titel"], "timestamp_update": "2015-10-28T07:28:00Z" } }"#;

    fn builder() -> JsonLdManifestBuilder {
        JsonLdManifestBuilder::new("https://iiif.europeana.eu/", "https://fulltext.example.org")
    }

    #[test]
    fn builds_v2_skeleton() {
        let manifest = builder().build(RECORD, ManifestVersion::V2, false, None).unwrap();
        assert_eq!(manifest["@id"], "https://iiif.europeana.eu/presentation/1/2/manifest");
        assert_eq!(manifest["@type"], "sc:Manifest");
        assert_eq!(manifest["label"], "Een titel");
        assert!(manifest.get("service").is_none());
    }

    #[test]
    fn builds_v3_with_search_service() {
        let override_api = Url::parse("http://localhost:8084/").unwrap();
        let manifest = builder()
            .build(RECORD, ManifestVersion::V3, true, Some(&override_api))
            .unwrap();
        assert_eq!(manifest["@context"], crate::config::IIIF_V3_CONTEXT);
        assert_eq!(manifest["id"], "https://iiif.europeana.eu/presentation/1/2/manifest");
        assert_eq!(manifest["service"][0]["id"], "http://localhost:8084/presentation/1/2/search");

        let json = builder().serialize(&manifest).unwrap();
        assert!(json.contains("\"type\": \"Manifest\""));
    }

    #[test]
    fn rejects_record_without_about() {
        let err = builder().build(br#"{"object":{}}"#, ManifestVersion::V2, false, None);
        assert!(matches!(err, Err(ManifestKitError::ManifestError(_))));
    }
}

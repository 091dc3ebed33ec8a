//! FHIR package server API client (packages.fhir.org and compatible NPM registries)

use crate::error::{Error, Result};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_REGISTRY_URL: &str = "https://packages.fhir.org";

/// Client for an NPM-style FHIR package registry.
#[derive(Debug, Clone)]
pub struct PackageServerClient {
    client: Client,
    base_url: String,
}

impl PackageServerClient {
    /// Create a client for the primary FHIR package registry.
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_REGISTRY_URL.to_string())
    }

    /// Create a client with a custom base URL.
    pub fn with_base_url(base_url: String) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(120)).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get all published versions of a package.
    pub async fn get_versions(&self, package_name: &str) -> Result<Vec<String>> {
        let url = format!("{}/{}", self.base_url, urlencoding::encode(package_name));
        tracing::debug!(%url, "Fetching package versions");
        let response = self.client.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::PackageNotFound {
                name: package_name.to_string(),
                version: "*".to_string(),
            });
        }
        if !response.status().is_success() {
            return Err(Error::Registry(format!(
                "Failed to get versions for {}: status {}",
                package_name,
                response.status()
            )));
        }

        let package_metadata: Value = response.json().await?;
        versions_from_metadata(&package_metadata).ok_or_else(|| {
            Error::Registry(format!(
                "Invalid package metadata for {}: missing or invalid 'versions' field",
                package_name
            ))
        })
    }

    /// Download the tar.gz archive of a package version.
    pub async fn download_package(&self, package_name: &str, version: &str) -> Result<Vec<u8>> {
        let url = format!(
            "{}/{}/{}",
            self.base_url,
            urlencoding::encode(package_name),
            urlencoding::encode(version)
        );
        tracing::debug!(%url, "Downloading package");
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(Error::PackageNotFound {
                name: package_name.to_string(),
                version: version.to_string(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

/// Version keys of an NPM package document (`{"versions": {"1.0.0": {...}}}`).
fn versions_from_metadata(metadata: &Value) -> Option<Vec<String>> {
    metadata
        .get("versions")
        .and_then(Value::as_object)
        .map(|obj| obj.keys().cloned().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_package_metadata_versions() {
        let metadata: Value = serde_json::from_str(
            r#"{
                "_id": "de.basisprofil.r4",
                "name": "de.basisprofil.r4",
                "dist-tags": {"latest": "1.5.4"},
                "versions": {
                    "0.9.0": {"name": "de.basisprofil.r4", "version": "0.9.0"},
                    "1.5.3": {"name": "de.basisprofil.r4", "version": "1.5.3"},
                    "1.5.4": {"name": "de.basisprofil.r4", "version": "1.5.4"}
                }
            }"#,
        )
        .unwrap();

        let versions = versions_from_metadata(&metadata).unwrap();
        assert_eq!(versions, vec!["0.9.0", "1.5.3", "1.5.4"]);
    }

    #[test]
    fn test_parse_empty_versions() {
        let metadata: Value = serde_json::from_str(r#"{"name": "test.package", "versions": {}}"#).unwrap();
        assert_eq!(versions_from_metadata(&metadata), Some(Vec::new()));
    }

    #[test]
    fn test_parse_missing_or_invalid_versions_field() {
        let missing: Value = serde_json::from_str(r#"{"name": "test.package"}"#).unwrap();
        assert_eq!(versions_from_metadata(&missing), None);

        let array: Value = serde_json::from_str(r#"{"versions": []}"#).unwrap();
        assert_eq!(versions_from_metadata(&array), None);
    }

    #[test]
    fn base_url_is_normalized() {
        let client = PackageServerClient::with_base_url("http://localhost:8080/".into()).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
        assert_eq!(PackageServerClient::new().unwrap().base_url(), DEFAULT_REGISTRY_URL);
    }
}

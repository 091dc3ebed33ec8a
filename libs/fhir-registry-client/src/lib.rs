//! FHIR Package Registry Client
//!
//! This crate provides async-first functionality to load and cache FHIR packages from
//! a local package store and an NPM-style FHIR package registry.
//!
//! # Examples
//!
//! ```rust,no_run
//! use ember_registry_client::RegistryClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = RegistryClient::new(None)?;
//! let package = client.load_or_download_package("hl7.fhir.us.core", "6.1.0").await?;
//! # Ok(())
//! # }
//! ```
//!
pub mod async_client;
pub mod cache;
pub mod error;
pub mod package_server;
pub mod version_resolver;

pub use async_client::RegistryClient;
pub use cache::{FileSystemCache, PackageStore};
pub use error::{Error, Result};
pub use package_server::{PackageServerClient, DEFAULT_REGISTRY_URL};
pub use version_resolver::select_version;

// Re-export package types for convenience
pub use ember_package::{FhirPackage, PackageId};

/// Minimal package archive with one example Patient and the given dependencies.
#[cfg(test)]
pub(crate) fn test_archive(name: &str, version: &str, dependencies: &[(&str, &str)]) -> Vec<u8> {
    use flate2::write::GzEncoder;
    use flate2::Compression;

    let deps: serde_json::Map<String, serde_json::Value> = dependencies
        .iter()
        .map(|(n, v)| (n.to_string(), serde_json::Value::from(*v)))
        .collect();
    let manifest = serde_json::to_vec(&serde_json::json!({
        "name": name,
        "version": version,
        "fhirVersions": ["4.0.1"],
        "dependencies": deps,
        "author": "test"
    }))
    .unwrap();
    let patient = br#"{"resourceType": "Patient", "id": "p1"}"#;

    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (path, contents) in [
        ("package/package.json", manifest.as_slice()),
        ("package/example/Patient-p1.json", patient.as_slice()),
    ] {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        builder.append_data(&mut header, path, contents).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

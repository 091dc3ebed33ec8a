//! On-disk package store.
//!
//! Packages are extracted to `<root>/<name>#<version>/package/...`, the layout used by
//! the HL7 tooling, so a store can be shared with other FHIR tools on the same machine.

use crate::error::{Error, Result};
use ember_package::FhirPackage;
use flate2::read::GzDecoder;
use std::fs;
use std::path::{Path, PathBuf};
use tar::Archive;

/// Persistent store of extracted packages keyed by `(name, version)`.
pub trait PackageStore: Send + Sync {
    fn has_package(&self, name: &str, version: &str) -> bool;

    fn load_package(&self, name: &str, version: &str) -> Result<FhirPackage>;

    /// Parse a tar.gz archive and persist it under the identity declared in its manifest.
    fn store_package(&self, archive: &[u8]) -> Result<FhirPackage>;

    /// Versions of `name` present in the store.
    fn list_versions(&self, name: &str) -> Result<Vec<String>>;
}

/// [`PackageStore`] backed by a directory, `~/.fhir/packages` by default.
#[derive(Debug, Clone)]
pub struct FileSystemCache {
    root: PathBuf,
}

impl FileSystemCache {
    pub fn new(root: Option<PathBuf>) -> Self {
        let root = root.unwrap_or_else(default_cache_root);
        Self { root }
    }

    pub fn cache_root(&self) -> &Path {
        &self.root
    }

    fn package_dir(&self, name: &str, version: &str) -> PathBuf {
        self.root.join(format!("{}#{}", name, version))
    }
}

fn default_cache_root() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".fhir")
        .join("packages")
}

impl PackageStore for FileSystemCache {
    fn has_package(&self, name: &str, version: &str) -> bool {
        self.package_dir(name, version)
            .join("package")
            .join("package.json")
            .is_file()
    }

    fn load_package(&self, name: &str, version: &str) -> Result<FhirPackage> {
        if !self.has_package(name, version) {
            return Err(Error::PackageNotFound {
                name: name.to_string(),
                version: version.to_string(),
            });
        }
        let package_dir = self.package_dir(name, version).join("package");
        Ok(FhirPackage::from_directory(&package_dir)?)
    }

    fn store_package(&self, archive: &[u8]) -> Result<FhirPackage> {
        let package = FhirPackage::from_tar_gz_bytes(archive)?;
        let target = self.package_dir(package.name(), package.version());

        fs::create_dir_all(&self.root)?;
        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&self.root)?;
        Archive::new(GzDecoder::new(archive)).unpack(staging.path())?;

        if target.exists() {
            fs::remove_dir_all(&target)?;
        }
        fs::rename(staging.path(), &target)?;

        tracing::debug!(
            package = %package.id(),
            path = %target.display(),
            "Stored package in local cache"
        );
        Ok(package)
    }

    fn list_versions(&self, name: &str) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let prefix = format!("{}#", name);
        let mut versions = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let file_name = entry.file_name();
            if let Some(version) = file_name.to_string_lossy().strip_prefix(&prefix) {
                if self.has_package(name, version) {
                    versions.push(version.to_string());
                }
            }
        }
        versions.sort();
        Ok(versions)
    }
}

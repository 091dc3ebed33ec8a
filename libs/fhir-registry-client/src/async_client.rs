//! Async registry client: local store first, package server second.

use crate::cache::{FileSystemCache, PackageStore};
use crate::error::{Error, Result};
use crate::package_server::PackageServerClient;
use crate::version_resolver::select_version;
use ember_package::{FhirPackage, PackageId};
use std::path::PathBuf;

/// Loads packages from a [`PackageStore`], downloading and persisting missing ones.
#[derive(Debug, Clone)]
pub struct RegistryClient<C = FileSystemCache> {
    cache: C,
    server: PackageServerClient,
}

impl RegistryClient<FileSystemCache> {
    /// Client over the filesystem store at `cache_root` (`~/.fhir/packages` when `None`)
    /// and the default package registry.
    pub fn new(cache_root: Option<PathBuf>) -> Result<Self> {
        Ok(Self::with_parts(
            FileSystemCache::new(cache_root),
            PackageServerClient::new()?,
        ))
    }
}

impl<C: PackageStore> RegistryClient<C> {
    pub fn with_parts(cache: C, server: PackageServerClient) -> Self {
        Self { cache, server }
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn server(&self) -> &PackageServerClient {
        &self.server
    }

    /// Load `name#version` from the store, downloading it first when absent.
    ///
    /// `version` may be a wildcard (`1.2.x`) or keyword (`current`); it is resolved to a
    /// concrete release before the store is consulted.
    pub async fn load_or_download_package(&self, name: &str, version: &str) -> Result<FhirPackage> {
        let resolved = self.resolve_version(name, version).await?;

        if self.cache.has_package(name, &resolved) {
            tracing::debug!(package = name, version = %resolved, "Loading package from local cache");
            return self.cache.load_package(name, &resolved);
        }

        tracing::info!(
            package = name,
            version = %resolved,
            registry = self.server.base_url(),
            "Package not in local cache, downloading"
        );
        let archive = self.server.download_package(name, &resolved).await?;
        let package = self.install_package(&archive).await?;

        if package.name() != name {
            tracing::warn!(
                requested = name,
                received = package.name(),
                "Registry returned a package with a different name"
            );
        }
        Ok(package)
    }

    /// Persist a tar.gz archive in the store under its manifest identity.
    pub async fn install_package(&self, archive: &[u8]) -> Result<FhirPackage> {
        let package = self.cache.store_package(archive)?;
        tracing::info!(package = %package.id(), "Installed package into local cache");
        Ok(package)
    }

    async fn resolve_version(&self, name: &str, version: &str) -> Result<String> {
        let requested = PackageId::new(name, version);
        if requested.is_exact() {
            return Ok(version.to_string());
        }

        // Patch wildcards may be satisfied offline; keywords always ask the registry.
        if version.ends_with(".x") {
            let local = self.cache.list_versions(name)?;
            if let Some(found) = select_version(&local, Some(version)) {
                return Ok(found);
            }
        }

        let remote = self.server.get_versions(name).await?;
        let selected = select_version(&remote, Some(version)).ok_or_else(|| Error::PackageNotFound {
            name: name.to_string(),
            version: version.to_string(),
        })?;
        tracing::debug!(package = name, requested = version, resolved = %selected, "Resolved package version");
        Ok(selected)
    }
}

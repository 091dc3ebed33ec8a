use crate::error::Result;
use async_trait::async_trait;
use ember_package::{FhirPackage, PackageId};
use ember_registry_client::{PackageStore, RegistryClient};

/// Source of packages by identity, plus installation of raw archives.
#[async_trait]
pub trait PackageLoader: Send + Sync {
    /// Load a package by `name#version`; wildcard versions are resolved by the loader.
    async fn load_package(&self, id: &PackageId) -> Result<FhirPackage>;

    /// Parse a tar.gz archive and register it under its manifest identity.
    async fn install_package(&self, archive: &[u8]) -> Result<FhirPackage>;
}

#[async_trait]
impl<C> PackageLoader for RegistryClient<C>
where
    C: PackageStore + Send + Sync + 'static,
{
    async fn load_package(&self, id: &PackageId) -> Result<FhirPackage> {
        Ok(RegistryClient::load_or_download_package(self, &id.name, &id.version).await?)
    }

    async fn install_package(&self, archive: &[u8]) -> Result<FhirPackage> {
        Ok(RegistryClient::install_package(self, archive).await?)
    }
}

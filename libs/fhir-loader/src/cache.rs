//! Run-scoped package memo.

use crate::error::Result;
use crate::loader::PackageLoader;
use ember_package::{version_matches, FhirPackage, PackageId};
use indexmap::IndexMap;
use std::sync::Arc;

/// Packages loaded during one run, keyed by identity.
///
/// A dependency reached through several paths of the graph is loaded once. Requests with a
/// wildcard or label variant of an already loaded version reuse that package.
pub struct PackageCache {
    loader: Arc<dyn PackageLoader>,
    packages: IndexMap<PackageId, Arc<FhirPackage>>,
    loads: usize,
}

impl PackageCache {
    pub fn new(loader: Arc<dyn PackageLoader>) -> Self {
        Self {
            loader,
            packages: IndexMap::new(),
            loads: 0,
        }
    }

    /// Register a package obtained elsewhere (e.g. the root archive) under its own identity.
    pub fn insert(&mut self, package: FhirPackage) -> Arc<FhirPackage> {
        let package = Arc::new(package);
        self.packages.insert(package.id(), Arc::clone(&package));
        package
    }

    pub fn get(&self, id: &PackageId) -> Option<Arc<FhirPackage>> {
        if let Some(package) = self.packages.get(id) {
            return Some(Arc::clone(package));
        }

        self.packages
            .values()
            .find(|p| p.name() == id.name && version_matches(p.version(), &id.version))
            .cloned()
    }

    pub async fn get_or_load(&mut self, id: &PackageId) -> Result<Arc<FhirPackage>> {
        if let Some(package) = self.get(id) {
            tracing::trace!(package = %id, "Package already loaded");
            return Ok(package);
        }

        let package = Arc::new(self.loader.load_package(id).await?);
        self.loads += 1;

        let resolved = package.id();
        if &resolved != id {
            tracing::debug!(requested = %id, resolved = %resolved, "Resolved package reference");
            self.packages.insert(id.clone(), Arc::clone(&package));
        }
        self.packages.insert(resolved, Arc::clone(&package));
        Ok(package)
    }

    /// Number of loads that went to the loader.
    pub fn loads(&self) -> usize {
        self.loads
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

//! Decoding of package folder contents into resource records.

use crate::error::{Error, Result};
use ember_models::{FhirVersion, ResourceCodec, ResourceRecord};
use ember_package::{FhirPackage, EXAMPLE_FOLDER, ROOT_FOLDER};
use std::sync::Arc;

/// Folders read from every package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderSelection {
    pub example_folder: String,
    pub root_folder: String,
    /// Also read the root folder, after the example folder.
    pub include_root_folder: bool,
}

impl Default for FolderSelection {
    fn default() -> Self {
        Self {
            example_folder: EXAMPLE_FOLDER.to_string(),
            root_folder: ROOT_FOLDER.to_string(),
            include_root_folder: false,
        }
    }
}

impl FolderSelection {
    pub fn folders(&self) -> Vec<&str> {
        let mut folders = vec![self.example_folder.as_str()];
        if self.include_root_folder {
            folders.push(self.root_folder.as_str());
        }
        folders
    }
}

pub struct ResourceExtractor {
    codec: Arc<dyn ResourceCodec>,
    fallback_version: FhirVersion,
}

impl ResourceExtractor {
    pub fn new(codec: Arc<dyn ResourceCodec>, fallback_version: FhirVersion) -> Self {
        Self {
            codec,
            fallback_version,
        }
    }

    /// FHIR version the package's members are decoded under.
    pub fn fhir_version_of(&self, package: &FhirPackage) -> FhirVersion {
        package
            .manifest
            .declared_fhir_version()
            .as_deref()
            .and_then(FhirVersion::from_version_string)
            .unwrap_or(self.fallback_version)
    }

    /// Decode every listed file of `folder`, grouped by type then by file name.
    ///
    /// A package without the folder yields nothing.
    pub fn extract(&self, package: &FhirPackage, folder: &str) -> Result<Vec<ResourceRecord>> {
        let Some(listing) = package.list_folder(folder) else {
            tracing::debug!(package = %package.id(), folder, "Package has no such folder");
            return Ok(Vec::new());
        };

        let version = self.fhir_version_of(package);
        let mut records = Vec::with_capacity(listing.len());

        for file in listing.file_names() {
            let extraction_error = |message: String| Error::Extraction {
                package: package.id().to_string(),
                file: format!("{}/{}", folder, file),
                message,
            };

            let bytes = package
                .fetch_file(folder, file)
                .map_err(|e| extraction_error(e.to_string()))?;
            let record = self
                .codec
                .decode(bytes, version)
                .map_err(|e| extraction_error(e.to_string()))?;
            records.push(record.with_source(file));
        }

        tracing::debug!(
            package = %package.id(),
            folder,
            count = records.len(),
            fhir_version = %version,
            "Extracted resources"
        );
        Ok(records)
    }

    /// Records of every selected folder, example folder first.
    pub fn extract_all(
        &self,
        package: &FhirPackage,
        folders: &FolderSelection,
    ) -> Result<Vec<ResourceRecord>> {
        let mut records = Vec::new();
        for folder in folders.folders() {
            records.extend(self.extract(package, folder)?);
        }
        Ok(records)
    }
}

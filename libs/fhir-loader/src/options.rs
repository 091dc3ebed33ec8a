use crate::assemble::{MissingIdPolicy, WriteMode};
use crate::directory::DirectoryOptions;
use crate::error::{Error, Result};
use crate::extract::FolderSelection;
use crate::filter::FilterOptions;
use ember_models::FhirVersion;
use ember_package::PackageId;
use std::time::Duration;

/// Default readiness wait for a remote FHIR server.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(60 * 60);

/// Everything a single loader run needs to know.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Root package, `name#version`.
    pub package_id: Option<PackageId>,
    /// Path, `file:` URL or `http(s)` URL of a root package archive. Takes precedence over
    /// `package_id`.
    pub location: Option<String>,
    /// When set, resources are read from this directory and no package is resolved.
    pub directory: Option<DirectoryOptions>,
    pub load_recursively: bool,
    pub filter: FilterOptions,
    pub folders: FolderSelection,
    pub write_mode: WriteMode,
    pub missing_id_policy: MissingIdPolicy,
    /// Used for packages that do not declare a FHIR version.
    pub fallback_fhir_version: FhirVersion,
    /// Readiness wait before sending; zero skips the wait.
    pub max_wait: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            package_id: None,
            location: None,
            directory: None,
            load_recursively: false,
            filter: FilterOptions::default(),
            folders: FolderSelection::default(),
            write_mode: WriteMode::default(),
            missing_id_policy: MissingIdPolicy::default(),
            fallback_fhir_version: FhirVersion::R4,
            max_wait: DEFAULT_MAX_WAIT,
        }
    }
}

impl RunOptions {
    pub fn validate(&self) -> Result<()> {
        if self.directory.is_some() {
            return Ok(());
        }

        if self.package_id.is_none() && self.location.as_deref().map_or(true, str::is_empty) {
            return Err(Error::Config(
                "a package id, a package location or a directory is required".into(),
            ));
        }

        if self.folders.include_root_folder
            && self.folders.root_folder == self.folders.example_folder
        {
            return Err(Error::Config(format!(
                "root folder and example folder are both '{}'",
                self.folders.root_folder
            )));
        }

        Ok(())
    }
}

use anyhow::{Context, Result};
use clap::Parser;
use ember_loader::{
    DirectoryOptions, FilterOptions, FolderSelection, MissingIdPolicy, RunOptions, WriteMode,
};
use ember_models::FhirVersion;
use ember_package::{PackageId, EXAMPLE_FOLDER, ROOT_FOLDER};
use ember_registry_client::DEFAULT_REGISTRY_URL;
use std::path::PathBuf;
use std::time::Duration;

/// Load the example resources of a FHIR Implementation Guide into a FHIR server.
///
/// Without `--server-base` the transaction bundle is printed to stdout.
#[derive(Debug, Parser)]
#[command(name = "ember", version, about)]
pub struct Args {
    /// Root package as `name#version`
    #[arg(long, env = "EMBER_PACKAGE_ID")]
    pub package_id: Option<String>,

    /// Path, file: URL or http(s) URL of a package .tgz; overrides --package-id
    #[arg(long, env = "EMBER_LOCATION")]
    pub location: Option<String>,

    /// Load resources from this directory instead of a package
    #[arg(long, env = "EMBER_DIRECTORY")]
    pub directory: Option<PathBuf>,

    /// Only load directory files whose name contains this text
    #[arg(long, env = "EMBER_DIRECTORY_FILTER", requires = "directory")]
    pub directory_filter: Option<String>,

    /// FHIR version used to read directory files
    #[arg(long, env = "EMBER_DIRECTORY_FHIR_VERSION", default_value = "R5", value_parser = parse_fhir_version)]
    pub directory_fhir_version: FhirVersion,

    /// FHIR server base URL; absent prints the bundle instead
    #[arg(long, env = "EMBER_SERVER_BASE")]
    pub server_base: Option<String>,

    /// Minutes to wait for the server to become ready; 0 disables the wait
    #[arg(long, env = "EMBER_AWAIT_MINUTES", default_value_t = 60)]
    pub await_minutes: u64,

    /// Seconds between readiness checks
    #[arg(long, env = "EMBER_POLL_INTERVAL_SECONDS", default_value_t = 5)]
    pub poll_interval_seconds: u64,

    /// Also load the examples of every (transitive) dependency
    #[arg(long, env = "EMBER_LOAD_RECURSIVELY")]
    pub load_recursively: bool,

    /// Keep search result bundles
    #[arg(long, env = "EMBER_INCLUDE_SEARCH_BUNDLES")]
    pub include_search_bundles: bool,

    /// Keep only document bundles and List resources
    #[arg(long, env = "EMBER_DOCS_AND_LISTS_ONLY")]
    pub docs_and_lists_only: bool,

    /// Also load the resources in the package root folder
    #[arg(long, env = "EMBER_INCLUDE_ROOT_FOLDER")]
    pub include_root_folder: bool,

    /// Package folder holding the examples
    #[arg(long, env = "EMBER_EXAMPLE_FOLDER", default_value = EXAMPLE_FOLDER)]
    pub example_folder: String,

    /// Package root folder
    #[arg(long, env = "EMBER_ROOT_FOLDER", default_value = ROOT_FOLDER)]
    pub root_folder: String,

    /// FHIR version for packages that do not declare one
    #[arg(long, env = "EMBER_FALLBACK_FHIR_VERSION", default_value = "R4", value_parser = parse_fhir_version)]
    pub fallback_fhir_version: FhirVersion,

    /// Write resources with PUT under their own id instead of POST
    #[arg(long, env = "EMBER_UPSERT")]
    pub upsert: bool,

    /// With --upsert, fail on resources without an id instead of creating them
    #[arg(long, env = "EMBER_REJECT_MISSING_IDS")]
    pub reject_missing_ids: bool,

    /// Print the bundle on one line
    #[arg(long, env = "EMBER_COMPACT")]
    pub compact: bool,

    /// Local package store
    #[arg(long, env = "EMBER_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Package registry
    #[arg(long, env = "EMBER_REGISTRY_URL", default_value = DEFAULT_REGISTRY_URL)]
    pub registry_url: String,

    #[arg(long, env = "EMBER_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "EMBER_LOG_JSON")]
    pub log_json: bool,
}

fn parse_fhir_version(value: &str) -> std::result::Result<FhirVersion, String> {
    value.parse().map_err(|e: ember_models::Error| e.to_string())
}

impl Args {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds.max(1))
    }

    pub fn run_options(&self) -> Result<RunOptions> {
        let package_id = self
            .package_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .map(str::parse::<PackageId>)
            .transpose()
            .context("Invalid --package-id")?;

        let directory = self.directory.as_ref().map(|path| DirectoryOptions {
            path: path.clone(),
            name_filter: self.directory_filter.clone(),
            fhir_version: self.directory_fhir_version,
        });

        Ok(RunOptions {
            package_id,
            location: self.location.clone().filter(|l| !l.trim().is_empty()),
            directory,
            load_recursively: self.load_recursively,
            filter: FilterOptions {
                exclude_search_bundles: !self.include_search_bundles,
                docs_and_lists_only: self.docs_and_lists_only,
            },
            folders: FolderSelection {
                example_folder: self.example_folder.clone(),
                root_folder: self.root_folder.clone(),
                include_root_folder: self.include_root_folder,
            },
            write_mode: if self.upsert {
                WriteMode::Upsert
            } else {
                WriteMode::CreateOnly
            },
            missing_id_policy: if self.reject_missing_ids {
                MissingIdPolicy::Reject
            } else {
                MissingIdPolicy::FallbackToCreate
            },
            fallback_fhir_version: self.fallback_fhir_version,
            max_wait: Duration::from_secs(self.await_minutes.saturating_mul(60)),
        })
    }
}

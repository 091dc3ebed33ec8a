//! Loading resources straight from a local directory, bypassing package resolution.

use crate::error::{Error, Result};
use ember_models::{FhirVersion, ResourceCodec, ResourceRecord};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryOptions {
    pub path: PathBuf,
    /// Only files whose name contains this substring are read.
    pub name_filter: Option<String>,
    pub fhir_version: FhirVersion,
}

impl DirectoryOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            name_filter: None,
            fhir_version: FhirVersion::R5,
        }
    }

    fn admits(&self, file_name: &str) -> bool {
        Path::new(file_name).extension().is_some_and(|ext| ext == "json")
            && self
                .name_filter
                .as_deref()
                .map_or(true, |filter| file_name.contains(filter))
    }
}

/// Names of the regular files in the directory that qualify, sorted.
pub async fn list_files(options: &DirectoryOptions) -> Result<Vec<String>> {
    let location = options.path.display().to_string();
    let mut entries = tokio::fs::read_dir(&options.path)
        .await
        .map_err(|e| Error::fetch(&location, e))?;

    let mut names = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| Error::fetch(&location, e))?
    {
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| Error::fetch(&location, e))?;
        if !file_type.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if options.admits(&name) {
            names.push(name);
        }
    }

    names.sort();
    Ok(names)
}

/// Decode every qualifying file of the directory, in file name order.
pub async fn load_directory(
    options: &DirectoryOptions,
    codec: &dyn ResourceCodec,
) -> Result<Vec<ResourceRecord>> {
    let names = list_files(options).await?;
    tracing::info!(
        directory = %options.path.display(),
        count = names.len(),
        "Loading resources from directory"
    );

    let mut records = Vec::with_capacity(names.len());
    for name in names {
        let path = options.path.join(&name);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| Error::fetch(path.display().to_string(), e))?;
        let record = codec
            .decode(&bytes, options.fhir_version)
            .map_err(|e| Error::Extraction {
                package: options.path.display().to_string(),
                file: name.clone(),
                message: e.to_string(),
            })?;
        records.push(record.with_source(name));
    }
    Ok(records)
}

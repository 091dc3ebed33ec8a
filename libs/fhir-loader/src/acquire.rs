//! Package acquisition from an identifier, a local archive, or a URL.

use crate::error::{Error, Result};
use crate::loader::PackageLoader;
use ember_package::{FhirPackage, PackageId};
use reqwest::Url;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Where a package comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageSource {
    Id(PackageId),
    Path(PathBuf),
    Url(Url),
}

impl PackageSource {
    /// Classify a user supplied package reference.
    ///
    /// `http(s)://` is a download, `file:` and anything that looks like a file path is a local
    /// archive, and everything else is parsed as `name#version`.
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(Error::Config("empty package reference".into()));
        }

        if reference.starts_with("http://") || reference.starts_with("https://") {
            let url = Url::parse(reference)
                .map_err(|e| Error::Config(format!("invalid package URL '{}': {}", reference, e)))?;
            return Ok(Self::Url(url));
        }

        if reference.starts_with("file:") {
            let path = Url::parse(reference)
                .ok()
                .and_then(|url| url.to_file_path().ok())
                .ok_or_else(|| Error::Config(format!("invalid file URL '{}'", reference)))?;
            return Ok(Self::Path(path));
        }

        if looks_like_path(reference) {
            return Ok(Self::Path(PathBuf::from(reference)));
        }

        reference.parse::<PackageId>()
            .map(Self::Id)
            .map_err(|e| Error::Config(e.to_string()))
    }
}

fn looks_like_path(reference: &str) -> bool {
    reference.ends_with(".tgz")
        || reference.ends_with(".tar.gz")
        || reference.contains('/')
        || reference.contains('\\')
        || Path::new(reference).is_file()
}

/// Obtains root packages; archives from paths and URLs are installed into the local store.
pub struct PackageAcquirer {
    loader: Arc<dyn PackageLoader>,
    http: reqwest::Client,
}

impl PackageAcquirer {
    pub fn new(loader: Arc<dyn PackageLoader>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { loader, http })
    }

    pub async fn acquire(&self, reference: &str) -> Result<FhirPackage> {
        self.acquire_source(&PackageSource::parse(reference)?).await
    }

    pub async fn acquire_source(&self, source: &PackageSource) -> Result<FhirPackage> {
        match source {
            PackageSource::Id(id) => {
                tracing::info!(package = %id, "Loading package");
                self.loader.load_package(id).await
            }
            PackageSource::Path(path) => {
                tracing::info!(path = %path.display(), "Loading package archive from disk");
                let archive = tokio::fs::read(path)
                    .await
                    .map_err(|e| Error::fetch(path.display().to_string(), e))?;
                self.loader.install_package(&archive).await
            }
            PackageSource::Url(url) => {
                tracing::info!(%url, "Downloading package archive");
                let archive = self.download(url).await?;
                self.loader.install_package(&archive).await
            }
        }
    }

    async fn download(&self, url: &Url) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| Error::fetch(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::fetch(url.as_str(), format!("received HTTP {}", status)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::fetch(url.as_str(), e))?;
        Ok(bytes.to_vec())
    }
}

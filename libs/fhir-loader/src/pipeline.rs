//! A complete loader run: resolve, extract, filter, assemble, emit.

use crate::acquire::{PackageAcquirer, PackageSource};
use crate::assemble::BundleAssembler;
use crate::cache::PackageCache;
use crate::directory::load_directory;
use crate::emit::Emitter;
use crate::error::{Error, Result};
use crate::extract::ResourceExtractor;
use crate::filter;
use crate::loader::PackageLoader;
use crate::options::RunOptions;
use crate::walker::DependencyWalker;
use ember_models::{ResourceCodec, ResourceRecord};
use ember_package::PackageId;
use serde_json::Value;
use std::sync::Arc;

/// Outcome of a successful run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Packages visited, in walk order. Empty in directory mode.
    pub packages: Vec<PackageId>,
    /// Resources decoded before filtering.
    pub extracted: usize,
    /// Entries in the emitted transaction.
    pub emitted: usize,
    /// Response returned by the destination, if any.
    pub response: Option<Value>,
}

pub struct Pipeline {
    loader: Arc<dyn PackageLoader>,
    codec: Arc<dyn ResourceCodec>,
    emitter: Arc<dyn Emitter>,
    options: RunOptions,
}

impl Pipeline {
    pub fn new(
        loader: Arc<dyn PackageLoader>,
        codec: Arc<dyn ResourceCodec>,
        emitter: Arc<dyn Emitter>,
        options: RunOptions,
    ) -> Self {
        Self {
            loader,
            codec,
            emitter,
            options,
        }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    pub async fn run(&self) -> Result<RunSummary> {
        self.options.validate()?;

        let mut summary = RunSummary::default();
        let resources = match &self.options.directory {
            Some(directory) => {
                let records = load_directory(directory, self.codec.as_ref()).await?;
                summary.extracted = records.len();
                records
            }
            None => {
                let (packages, records) = self.collect_package_resources().await?;
                summary.packages = packages;
                summary.extracted = records.len();
                filter::apply(records, &self.options.filter)
            }
        };

        let bundle = BundleAssembler::new(self.options.write_mode)
            .with_missing_id_policy(self.options.missing_id_policy)
            .assemble(resources)?;
        summary.emitted = bundle.entry_count();

        if self.emitter.requires_readiness() && !self.options.max_wait.is_zero() {
            let ready = self.emitter.wait_until_ready(self.options.max_wait).await?;
            if !ready {
                return Err(Error::ReadinessTimeout {
                    endpoint: self.emitter.endpoint().to_string(),
                    waited: self.options.max_wait,
                });
            }
        }

        summary.response = self.emitter.send(&bundle).await?;
        tracing::info!(
            endpoint = self.emitter.endpoint(),
            packages = summary.packages.len(),
            extracted = summary.extracted,
            count = summary.emitted,
            "Run complete"
        );
        Ok(summary)
    }

    fn root_source(&self) -> Result<PackageSource> {
        match (&self.options.location, &self.options.package_id) {
            (Some(location), Some(id)) if !location.is_empty() => {
                tracing::warn!(
                    package = %id,
                    location = %location,
                    "Both a package id and a location are configured; loading from the location"
                );
                PackageSource::parse(location)
            }
            (Some(location), None) if !location.is_empty() => PackageSource::parse(location),
            (_, Some(id)) => Ok(PackageSource::Id(id.clone())),
            _ => Err(Error::Config("no root package configured".into())),
        }
    }

    async fn collect_package_resources(&self) -> Result<(Vec<PackageId>, Vec<ResourceRecord>)> {
        let acquirer = PackageAcquirer::new(Arc::clone(&self.loader))?;
        let mut cache = PackageCache::new(Arc::clone(&self.loader));

        let root = acquirer.acquire_source(&self.root_source()?).await?;
        let root = cache.insert(root);

        let packages = DependencyWalker::new(self.options.load_recursively)
            .resolve_all(root, &mut cache)
            .await?;

        let extractor = ResourceExtractor::new(
            Arc::clone(&self.codec),
            self.options.fallback_fhir_version,
        );
        let mut records = Vec::new();
        for package in &packages {
            records.extend(extractor.extract_all(package, &self.options.folders)?);
        }

        tracing::info!(
            packages = packages.len(),
            loads = cache.loads(),
            count = records.len(),
            "Extracted resources from packages"
        );
        Ok((packages.iter().map(|p| p.id()).collect(), records))
    }
}

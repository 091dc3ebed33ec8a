//! `ember`: load FHIR Implementation Guide examples into a FHIR server.

mod cli;
mod logging;

use anyhow::Context;
use clap::Parser;
use cli::Args;
use ember_loader::{ConsoleEmitter, Emitter, HttpEmitter, Pipeline};
use ember_models::JsonCodec;
use ember_registry_client::{FileSystemCache, PackageServerClient, RegistryClient};
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is not an error.
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    if let Err(e) = logging::init_logging(&args.log_level, args.log_json) {
        eprintln!("Failed to initialize logging: {e:#}");
        return ExitCode::FAILURE;
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "Run failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let options = args.run_options()?;
    options.validate()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        package = args.package_id.as_deref().unwrap_or("-"),
        location = args.location.as_deref().unwrap_or("-"),
        server = args.server_base.as_deref().unwrap_or("stdout"),
        "Starting ember"
    );

    let server = PackageServerClient::with_base_url(args.registry_url.clone())
        .context("Failed to create package registry client")?;
    let registry = RegistryClient::with_parts(FileSystemCache::new(args.cache_dir.clone()), server);
    tracing::debug!(cache = %registry.cache().cache_root().display(), "Using local package store");

    let emitter: Arc<dyn Emitter> = match &args.server_base {
        Some(base) if !base.trim().is_empty() => Arc::new(
            HttpEmitter::new(base.as_str())
                .context("Failed to create FHIR server client")?
                .with_poll_interval(args.poll_interval()),
        ),
        _ => Arc::new(ConsoleEmitter::new(!args.compact)),
    };

    let pipeline = Pipeline::new(
        Arc::new(registry),
        Arc::new(JsonCodec::new()),
        emitter,
        options,
    );
    let summary = pipeline.run().await?;

    tracing::info!(
        packages = summary.packages.len(),
        extracted = summary.extracted,
        count = summary.emitted,
        "Done"
    );
    Ok(())
}

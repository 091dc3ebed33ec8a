//! Logging initialization for the `ember` binary.
//!
//! Logs go to stderr so stdout carries only the printed bundle. `RUST_LOG` overrides the
//! configured level.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn init_logging(level: &str, json: bool) -> anyhow::Result<()> {
    let subscriber = tracing_subscriber::registry().with(build_env_filter(level));

    if json {
        subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    }

    tracing::debug!(level, json, "Logging initialized");
    Ok(())
}

fn build_env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "ember={level},ember_loader={level},ember_registry_client={level},ember_package={level},ember_models={level},reqwest=warn,hyper=warn"
        ))
    })
}

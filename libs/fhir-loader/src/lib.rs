//! Loads the example resources of FHIR Implementation Guide packages into a FHIR server.
//!
//! A run acquires a root package, optionally walks its dependencies, decodes the resources of
//! each package's example folder, filters them, wraps them in a single transaction bundle and
//! hands that to an [`Emitter`].
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ember_loader::{ConsoleEmitter, Pipeline, RunOptions};
//! use ember_models::JsonCodec;
//! use ember_registry_client::RegistryClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let options = RunOptions {
//!     package_id: Some("hl7.fhir.us.core#6.1.0".parse()?),
//!     ..Default::default()
//! };
//! let pipeline = Pipeline::new(
//!     Arc::new(RegistryClient::new(None)?),
//!     Arc::new(JsonCodec::new()),
//!     Arc::new(ConsoleEmitter::default()),
//!     options,
//! );
//! let summary = pipeline.run().await?;
//! println!("{} entries", summary.emitted);
//! # Ok(())
//! # }
//! ```

pub mod acquire;
pub mod assemble;
pub mod cache;
pub mod directory;
pub mod emit;
pub mod error;
pub mod extract;
pub mod filter;
pub mod loader;
pub mod options;
pub mod pipeline;
pub mod walker;

pub use acquire::{PackageAcquirer, PackageSource};
pub use assemble::{BundleAssembler, MissingIdPolicy, WriteMode};
pub use cache::PackageCache;
pub use directory::DirectoryOptions;
pub use emit::{ConsoleEmitter, Emitter, HttpEmitter};
pub use error::{Error, Result};
pub use extract::{FolderSelection, ResourceExtractor};
pub use filter::FilterOptions;
pub use loader::PackageLoader;
pub use options::RunOptions;
pub use pipeline::{Pipeline, RunSummary};
pub use walker::DependencyWalker;

/// Serve a single HTTP response on a loopback port; returns the base URL.
///
/// The whole request, body included, is read before responding.
#[cfg(test)]
pub(crate) async fn serve_once(status: &'static str, body: &'static str) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
            if let Some(end) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                let headers = String::from_utf8_lossy(&request[..end]).to_ascii_lowercase();
                let length = headers
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if request.len() >= end + 4 + length {
                    break;
                }
            }
        }

        let response = format!(
            "HTTP/1.1 {}\r\ncontent-type: application/fhir+json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        let _ = socket.shutdown().await;
    });

    format!("http://{}", addr)
}

//! Delivery of the assembled transaction.

use crate::error::{Error, Result};
use async_trait::async_trait;
use ember_models::Bundle;
use serde_json::Value;
use std::io::Write;
use std::time::Duration;
use tokio::time::Instant;

pub const FHIR_JSON: &str = "application/fhir+json";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Destination of the transaction bundle.
#[async_trait]
pub trait Emitter: Send + Sync {
    /// Human readable destination, used in logs and errors.
    fn endpoint(&self) -> &str;

    /// Whether the destination must be polled for readiness before sending.
    fn requires_readiness(&self) -> bool {
        false
    }

    /// Poll until the destination is ready or `max_wait` elapses. `false` means it never was.
    async fn wait_until_ready(&self, max_wait: Duration) -> Result<bool>;

    /// Deliver the bundle, returning the destination's response when it has one.
    async fn send(&self, bundle: &Bundle) -> Result<Option<Value>>;
}

/// Prints the bundle as JSON to stdout.
#[derive(Debug, Clone)]
pub struct ConsoleEmitter {
    pretty: bool,
}

impl ConsoleEmitter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    pub fn render(&self, bundle: &Bundle) -> Result<String> {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(bundle)
        } else {
            serde_json::to_string(bundle)
        };
        rendered.map_err(|e| Error::Format(e.to_string()))
    }
}

impl Default for ConsoleEmitter {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl Emitter for ConsoleEmitter {
    fn endpoint(&self) -> &str {
        "stdout"
    }

    async fn wait_until_ready(&self, _max_wait: Duration) -> Result<bool> {
        Ok(true)
    }

    async fn send(&self, bundle: &Bundle) -> Result<Option<Value>> {
        let rendered = self.render(bundle)?;
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", rendered)
            .and_then(|_| stdout.flush())
            .map_err(|e| Error::Transmission {
                endpoint: "stdout".into(),
                status: "io".into(),
                body: e.to_string(),
            })?;
        Ok(None)
    }
}

/// Posts the bundle to a FHIR server's base endpoint.
#[derive(Debug, Clone)]
pub struct HttpEmitter {
    client: reqwest::Client,
    base_url: String,
    poll_interval: Duration,
}

impl HttpEmitter {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(600))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// One readiness check: a count-only StructureDefinition search answered with 2xx.
    async fn check_ready(&self) -> bool {
        let url = format!("{}/StructureDefinition?_summary=count", self.base_url);
        match self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, FHIR_JSON)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                tracing::debug!(endpoint = %self.base_url, status = %response.status(), "FHIR server not ready");
                false
            }
            Err(e) => {
                tracing::debug!(endpoint = %self.base_url, error = %e, "FHIR server not reachable");
                false
            }
        }
    }
}

#[async_trait]
impl Emitter for HttpEmitter {
    fn endpoint(&self) -> &str {
        &self.base_url
    }

    fn requires_readiness(&self) -> bool {
        true
    }

    async fn wait_until_ready(&self, max_wait: Duration) -> Result<bool> {
        // A wait too long to represent as an instant has no deadline.
        let deadline = Instant::now().checked_add(max_wait);
        tracing::info!(endpoint = %self.base_url, ?max_wait, "Waiting for FHIR server");

        loop {
            if self.check_ready().await {
                tracing::info!(endpoint = %self.base_url, "FHIR server is ready");
                return Ok(true);
            }

            let pause = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(false);
                    }
                    self.poll_interval.min(deadline - now)
                }
                None => self.poll_interval,
            };
            tokio::time::sleep(pause).await;
        }
    }

    async fn send(&self, bundle: &Bundle) -> Result<Option<Value>> {
        let transmission_error = |status: String, body: String| Error::Transmission {
            endpoint: self.base_url.clone(),
            status,
            body,
        };

        let body = serde_json::to_vec(bundle).map_err(|e| Error::Format(e.to_string()))?;
        tracing::info!(endpoint = %self.base_url, count = bundle.entry_count(), "Sending transaction");

        let response = self
            .client
            .post(&self.base_url)
            .header(reqwest::header::CONTENT_TYPE, FHIR_JSON)
            .header(reqwest::header::ACCEPT, FHIR_JSON)
            .body(body)
            .send()
            .await
            .map_err(|e| transmission_error("unreachable".into(), e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| transmission_error(status.to_string(), e.to_string()))?;

        if !status.is_success() {
            return Err(transmission_error(status.to_string(), text));
        }

        let parsed = serde_json::from_str::<Value>(&text).ok();
        match &parsed {
            Some(response) => {
                let entries = response
                    .get("entry")
                    .and_then(Value::as_array)
                    .map_or(0, Vec::len);
                tracing::info!(endpoint = %self.base_url, %status, count = entries, "Transaction accepted");
                tracing::debug!(response = %response, "Transaction response");
            }
            None => tracing::info!(endpoint = %self.base_url, %status, "Transaction accepted"),
        }
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_models::{BundleEntry, BundleEntryRequest, BundleType};
    use serde_json::json;

    #[test]
    fn console_renders_transaction_json() {
        let mut bundle = Bundle::new(BundleType::Transaction);
        bundle.add_entry(BundleEntry::transaction(
            Some("urn:uuid:1".into()),
            json!({"resourceType": "Patient"}),
            BundleEntryRequest::new("POST", "Patient"),
        ));

        let rendered = ConsoleEmitter::new(false).render(&bundle).unwrap();
        let value: Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["resourceType"], "Bundle");
        assert_eq!(value["type"], "transaction");
        assert_eq!(value["entry"][0]["request"]["method"], "POST");
        assert!(!rendered.contains('\n'));

        assert!(ConsoleEmitter::default().render(&bundle).unwrap().contains('\n'));
    }

    #[tokio::test]
    async fn console_is_always_ready() {
        let emitter = ConsoleEmitter::default();
        assert!(!emitter.requires_readiness());
        assert!(emitter.wait_until_ready(Duration::ZERO).await.unwrap());
    }

    #[test]
    fn http_base_url_is_normalized() {
        let emitter = HttpEmitter::new("http://localhost:8080/fhir/").unwrap();
        assert_eq!(emitter.endpoint(), "http://localhost:8080/fhir");
        assert!(emitter.requires_readiness());
    }

    #[tokio::test]
    async fn unreachable_server_is_never_ready() {
        let emitter = HttpEmitter::new("http://127.0.0.1:9/fhir")
            .unwrap()
            .with_poll_interval(Duration::from_millis(10));
        let ready = emitter
            .wait_until_ready(Duration::from_millis(50))
            .await
            .unwrap();
        assert!(!ready);
    }

    #[tokio::test]
    async fn unreachable_server_fails_transmission() {
        let emitter = HttpEmitter::new("http://127.0.0.1:9/fhir").unwrap();
        let err = emitter
            .send(&Bundle::new(BundleType::Transaction))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transmission { ref endpoint, .. } if endpoint == "http://127.0.0.1:9/fhir"));
    }

    #[tokio::test]
    async fn rejected_transaction_carries_server_response() {
        let outcome = r#"{"resourceType":"OperationOutcome","issue":[{"severity":"error","code":"processing","diagnostics":"Unknown resource type"}]}"#;
        let base = crate::serve_once("422 Unprocessable Entity", outcome).await;
        let emitter = HttpEmitter::new(base.as_str()).unwrap();

        let err = emitter
            .send(&Bundle::new(BundleType::Transaction))
            .await
            .unwrap_err();
        match err {
            Error::Transmission { endpoint, status, body } => {
                assert_eq!(endpoint, base);
                assert!(status.contains("422"), "status was {status}");
                assert!(body.contains("OperationOutcome"));
                assert!(body.contains("Unknown resource type"));
            }
            other => panic!("expected a transmission error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unbounded_wait_returns_once_server_answers() {
        let base = crate::serve_once("200 OK", r#"{"resourceType":"Bundle","type":"searchset","total":0}"#).await;
        let emitter = HttpEmitter::new(base.as_str())
            .unwrap()
            .with_poll_interval(Duration::from_millis(10));
        assert!(emitter.wait_until_ready(Duration::MAX).await.unwrap());
    }
}

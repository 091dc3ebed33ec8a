//! Error taxonomy of a loader run.
//!
//! Every variant is fatal: the run stops at the first error and nothing is emitted.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to fetch {location}: {message}")]
    Fetch { location: String, message: String },

    #[error("Invalid format: {0}")]
    Format(String),

    #[error("Package not found: {name}#{version}")]
    NotFound { name: String, version: String },

    #[error("Failed to extract {file} from {package}: {message}")]
    Extraction {
        package: String,
        file: String,
        message: String,
    },

    #[error("FHIR server at {endpoint} did not become ready within {waited:?}")]
    ReadinessTimeout { endpoint: String, waited: Duration },

    #[error("FHIR server at {endpoint} failed to process the transaction ({status}): {body}")]
    Transmission {
        endpoint: String,
        status: String,
        body: String,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn fetch(location: impl Into<String>, message: impl ToString) -> Self {
        Self::Fetch {
            location: location.into(),
            message: message.to_string(),
        }
    }
}

impl From<ember_registry_client::Error> for Error {
    fn from(err: ember_registry_client::Error) -> Self {
        use ember_registry_client::Error as Registry;

        match err {
            Registry::PackageNotFound { name, version } => Self::NotFound { name, version },
            Registry::Http(e) => {
                let location = e
                    .url()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "package registry".to_string());
                Self::fetch(location, e)
            }
            Registry::Registry(message) => Self::fetch("package registry", message),
            Registry::Io(e) => Self::fetch("local package cache", e),
            Registry::Json(e) => Self::Format(e.to_string()),
            Registry::Package(e) => Self::from(e),
        }
    }
}

impl From<ember_package::PackageError> for Error {
    fn from(err: ember_package::PackageError) -> Self {
        Self::Format(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_errors_map_to_taxonomy() {
        let not_found: Error = ember_registry_client::Error::PackageNotFound {
            name: "a".into(),
            version: "1.0.0".into(),
        }
        .into();
        assert!(matches!(not_found, Error::NotFound { ref name, .. } if name == "a"));

        let format: Error = ember_registry_client::Error::Package(
            ember_package::PackageError::MissingFile("package/package.json".into()),
        )
        .into();
        assert!(matches!(format, Error::Format(ref msg) if msg.contains("package/package.json")));

        let io: Error = ember_registry_client::Error::Io(std::io::Error::other("disk full")).into();
        assert!(matches!(io, Error::Fetch { .. }));
    }
}

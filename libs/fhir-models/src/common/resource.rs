//! Decoded resources and version-independent kind classification.

use super::bundle::BundleType;
use super::error::{Error, Result};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// FHIR release families understood by the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FhirVersion {
    Dstu2,
    Stu3,
    R4,
    R4B,
    R5,
}

impl FhirVersion {
    /// Map a version string (`4.0.1`, `3.0.x`, `R4B`, ...) to its release family.
    pub fn from_version_string(version: &str) -> Option<Self> {
        let version = version.trim();
        match version.to_ascii_uppercase().as_str() {
            "DSTU2" | "R2" => return Some(Self::Dstu2),
            "STU3" | "DSTU3" | "R3" => return Some(Self::Stu3),
            "R4" => return Some(Self::R4),
            "R4B" => return Some(Self::R4B),
            "R5" => return Some(Self::R5),
            _ => {}
        }

        let base = version.split('-').next().unwrap_or(version);
        let mut parts = base.split('.');
        let major: u32 = parts.next()?.parse().ok()?;
        let minor: u32 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);

        match (major, minor) {
            (1, 0) => Some(Self::Dstu2),
            (1, 4..=8) | (3, _) => Some(Self::Stu3),
            (4, 0) => Some(Self::R4),
            (4, 1) | (4, 3) => Some(Self::R4B),
            (4, _) | (5, _) => Some(Self::R5),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dstu2 => "DSTU2",
            Self::Stu3 => "STU3",
            Self::R4 => "R4",
            Self::R4B => "R4B",
            Self::R5 => "R5",
        }
    }
}

impl fmt::Display for FhirVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FhirVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_version_string(s).ok_or_else(|| Error::UnsupportedFhirVersion(s.to_string()))
    }
}

/// Normalized kind of a decoded resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceKind {
    /// A Bundle; `None` when `Bundle.type` is missing or not a known code.
    Bundle(Option<BundleType>),
    List,
    Other(String),
}

impl ResourceKind {
    pub fn is_bundle_of(&self, bundle_type: BundleType) -> bool {
        matches!(self, Self::Bundle(Some(t)) if *t == bundle_type)
    }
}

/// Determines the [`ResourceKind`] of a decoded resource for a given release family.
pub trait KindClassifier: Send + Sync {
    fn classify(&self, resource: &Value, version: FhirVersion) -> ResourceKind;
}

/// Classifier for DSTU2 through R5.
///
/// All supported families name the list resource `List` and carry the bundle purpose in
/// `Bundle.type` using the same code system, so one rule set covers them.
#[derive(Debug, Clone, Copy, Default)]
pub struct FhirKindClassifier;

impl KindClassifier for FhirKindClassifier {
    fn classify(&self, resource: &Value, _version: FhirVersion) -> ResourceKind {
        match resource.get("resourceType").and_then(Value::as_str) {
            Some("Bundle") => ResourceKind::Bundle(
                resource
                    .get("type")
                    .and_then(Value::as_str)
                    .and_then(BundleType::from_code),
            ),
            Some("List") => ResourceKind::List,
            Some(other) => ResourceKind::Other(other.to_string()),
            None => ResourceKind::Other(String::new()),
        }
    }
}

/// A decoded package member.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRecord {
    pub resource: Value,
    pub kind: ResourceKind,
    pub fhir_version: FhirVersion,
    /// File the record was decoded from, when known.
    pub source: Option<String>,
}

impl ResourceRecord {
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn resource_type(&self) -> Option<&str> {
        self.resource.get("resourceType").and_then(Value::as_str)
    }

    pub fn id(&self) -> Option<&str> {
        self.resource
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
    }

    pub fn is_search_bundle(&self) -> bool {
        self.kind.is_bundle_of(BundleType::Searchset)
    }

    pub fn is_document_bundle(&self) -> bool {
        self.kind.is_bundle_of(BundleType::Document)
    }

    pub fn is_list(&self) -> bool {
        self.kind == ResourceKind::List
    }
}

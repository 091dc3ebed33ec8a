//! FHIR data models
//!
//! This crate provides the resource-level types used when turning package content into
//! transaction bundles.
//!
//! # Module Organization
//!
//! - `common`: Version-agnostic models (`Bundle`, `ResourceRecord`, `FhirVersion`)
//! - `codec`: Decoding of raw JSON members into classified records
//!
//! # Example
//!
//! ```rust
//! use ember_models::{FhirVersion, JsonCodec, ResourceCodec};
//!
//! let bytes = br#"{"resourceType": "Bundle", "type": "searchset"}"#;
//! let record = JsonCodec::new().decode(bytes, FhirVersion::R4).unwrap();
//! assert!(record.is_search_bundle());
//! ```

pub mod codec;
pub mod common;

// Re-export commonly used types
pub use codec::{JsonCodec, ResourceCodec};
pub use common::*;

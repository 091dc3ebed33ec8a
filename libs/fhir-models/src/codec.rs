//! JSON decoding of package members into [`ResourceRecord`]s.

use crate::common::{
    Error, FhirKindClassifier, FhirVersion, KindClassifier, ResourceRecord, Result,
};
use serde_json::Value;
use std::borrow::Cow;

/// Decodes raw member bytes into a classified resource.
pub trait ResourceCodec: Send + Sync {
    fn decode(&self, bytes: &[u8], version: FhirVersion) -> Result<ResourceRecord>;
}

/// FHIR JSON codec.
///
/// Narratives (`text`) are dropped by default, including those of contained resources
/// and bundle entries.
#[derive(Debug, Clone)]
pub struct JsonCodec<C = FhirKindClassifier> {
    suppress_narratives: bool,
    classifier: C,
}

impl JsonCodec {
    pub fn new() -> Self {
        Self::with_classifier(FhirKindClassifier)
    }
}

impl Default for JsonCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: KindClassifier> JsonCodec<C> {
    pub fn with_classifier(classifier: C) -> Self {
        Self {
            suppress_narratives: true,
            classifier,
        }
    }

    pub fn suppress_narratives(mut self, suppress: bool) -> Self {
        self.suppress_narratives = suppress;
        self
    }
}

impl<C: KindClassifier> ResourceCodec for JsonCodec<C> {
    fn decode(&self, bytes: &[u8], version: FhirVersion) -> Result<ResourceRecord> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        let mut resource: Value = serde_json::from_slice(&strip_control_bytes(bytes))?;

        match resource.get("resourceType") {
            Some(Value::String(rt)) if !rt.is_empty() => {}
            Some(_) => {
                return Err(Error::InvalidResource(
                    "resourceType must be a non-empty string".into(),
                ))
            }
            None if resource.is_object() => {
                return Err(Error::MissingField("resourceType".into()));
            }
            None => {
                return Err(Error::InvalidResource(
                    "expected a JSON object for the resource".into(),
                ))
            }
        }

        if self.suppress_narratives {
            strip_narratives(&mut resource);
        }

        let kind = self.classifier.classify(&resource, version);
        Ok(ResourceRecord {
            resource,
            kind,
            fhir_version: version,
            source: None,
        })
    }
}

/// Drop ASCII control characters other than tab, line feed and carriage return.
///
/// Bytes below 0x20 and 0x7F never occur inside multi-byte UTF-8 sequences.
fn strip_control_bytes(bytes: &[u8]) -> Cow<'_, [u8]> {
    let is_control = |b: &u8| (*b < b' ' && !matches!(*b, b'\t' | b'\n' | b'\r')) || *b == 0x7F;
    if bytes.iter().any(is_control) {
        Cow::Owned(bytes.iter().copied().filter(|b| !is_control(b)).collect())
    } else {
        Cow::Borrowed(bytes)
    }
}

fn strip_narratives(resource: &mut Value) {
    let Some(obj) = resource.as_object_mut() else {
        return;
    };

    if obj.get("text").is_some_and(Value::is_object) {
        obj.remove("text");
    }

    if let Some(Value::Array(contained)) = obj.get_mut("contained") {
        contained.iter_mut().for_each(strip_narratives);
    }

    if let Some(Value::Array(entries)) = obj.get_mut("entry") {
        for entry in entries {
            if let Some(inner) = entry.get_mut("resource") {
                strip_narratives(inner);
            }
        }
    }
}

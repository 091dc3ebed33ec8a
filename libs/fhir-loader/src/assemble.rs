//! Transaction bundle assembly.

use crate::error::{Error, Result};
use ember_models::{Bundle, BundleEntry, BundleEntryRequest, BundleType, ResourceRecord};
use uuid::Uuid;

/// How every entry of a transaction is written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteMode {
    /// `POST {type}`; the server assigns identities.
    #[default]
    CreateOnly,
    /// `PUT {type}/{id}`; the resource keeps its own identity.
    Upsert,
}

/// What upsert does with a resource that has no `id`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MissingIdPolicy {
    /// Write that entry as a create.
    #[default]
    FallbackToCreate,
    /// Fail the run with a format error.
    Reject,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BundleAssembler {
    mode: WriteMode,
    missing_id: MissingIdPolicy,
}

impl BundleAssembler {
    pub fn new(mode: WriteMode) -> Self {
        Self {
            mode,
            missing_id: MissingIdPolicy::default(),
        }
    }

    pub fn with_missing_id_policy(mut self, policy: MissingIdPolicy) -> Self {
        self.missing_id = policy;
        self
    }

    pub fn mode(&self) -> WriteMode {
        self.mode
    }

    /// Wrap `resources` in a transaction bundle, one entry per resource in input order.
    pub fn assemble(&self, resources: Vec<ResourceRecord>) -> Result<Bundle> {
        let mut bundle = Bundle::new(BundleType::Transaction);
        bundle.entry = Some(Vec::with_capacity(resources.len()));

        for record in resources {
            let entry = self.entry_for(record)?;
            bundle.add_entry(entry);
        }

        tracing::debug!(count = bundle.entry_count(), mode = ?self.mode, "Assembled transaction");
        Ok(bundle)
    }

    fn entry_for(&self, record: ResourceRecord) -> Result<BundleEntry> {
        let resource_type = record
            .resource_type()
            .ok_or_else(|| Error::Format("resource without resourceType".into()))?
            .to_string();

        if self.mode == WriteMode::Upsert {
            match record.id() {
                Some(id) => {
                    let url = format!("{}/{}", resource_type, id);
                    return Ok(BundleEntry::transaction(
                        Some(url.clone()),
                        record.resource,
                        BundleEntryRequest::new("PUT", url),
                    ));
                }
                None if self.missing_id == MissingIdPolicy::Reject => {
                    return Err(Error::Format(format!(
                        "{} resource{} has no id and cannot be upserted",
                        resource_type,
                        record
                            .source
                            .as_deref()
                            .map(|s| format!(" from {}", s))
                            .unwrap_or_default()
                    )));
                }
                None => {
                    tracing::warn!(
                        resource_type = %resource_type,
                        source = record.source.as_deref().unwrap_or("-"),
                        "Resource has no id, writing it as a create"
                    );
                }
            }
        }

        Ok(BundleEntry::transaction(
            Some(format!("urn:uuid:{}", Uuid::new_v4())),
            record.resource,
            BundleEntryRequest::new("POST", resource_type),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_models::{FhirVersion, JsonCodec, ResourceCodec};
    use serde_json::{json, Value};

    fn record(resource: Value) -> ResourceRecord {
        JsonCodec::new()
            .decode(resource.to_string().as_bytes(), FhirVersion::R4)
            .unwrap()
            .with_source("Test.json")
    }

    fn requests(bundle: &Bundle) -> Vec<(String, String)> {
        bundle
            .entries()
            .iter()
            .map(|e| {
                let request = e.request.as_ref().unwrap();
                (request.method.clone(), request.url.clone())
            })
            .collect()
    }

    #[test]
    fn create_only_posts_each_resource_in_order() {
        let bundle = BundleAssembler::new(WriteMode::CreateOnly)
            .assemble(vec![
                record(json!({"resourceType": "Patient", "id": "p1"})),
                record(json!({"resourceType": "Observation", "id": "o1"})),
            ])
            .unwrap();

        assert!(bundle.is_transaction());
        assert_eq!(
            requests(&bundle),
            vec![
                ("POST".to_string(), "Patient".to_string()),
                ("POST".to_string(), "Observation".to_string()),
            ]
        );
        let urls: Vec<_> = bundle
            .entries()
            .iter()
            .map(|e| e.full_url.clone().unwrap())
            .collect();
        assert!(urls.iter().all(|u| u.starts_with("urn:uuid:")));
        assert_ne!(urls[0], urls[1]);
    }

    #[test]
    fn upsert_puts_by_identity() {
        let bundle = BundleAssembler::new(WriteMode::Upsert)
            .assemble(vec![record(json!({"resourceType": "Patient", "id": "p1"}))])
            .unwrap();

        let entry = &bundle.entries()[0];
        assert_eq!(entry.full_url.as_deref(), Some("Patient/p1"));
        assert_eq!(requests(&bundle), vec![("PUT".into(), "Patient/p1".into())]);
        assert_eq!(entry.resource.as_ref().unwrap()["id"], "p1");
    }

    #[test]
    fn upsert_without_id_falls_back_to_create() {
        let bundle = BundleAssembler::new(WriteMode::Upsert)
            .assemble(vec![record(json!({"resourceType": "Patient"}))])
            .unwrap();
        assert_eq!(requests(&bundle), vec![("POST".into(), "Patient".into())]);
    }

    #[test]
    fn upsert_without_id_can_be_rejected() {
        let err = BundleAssembler::new(WriteMode::Upsert)
            .with_missing_id_policy(MissingIdPolicy::Reject)
            .assemble(vec![record(json!({"resourceType": "Patient"}))])
            .unwrap_err();
        assert!(matches!(err, Error::Format(ref msg) if msg.contains("Patient") && msg.contains("Test.json")));
    }

    #[test]
    fn empty_input_yields_empty_transaction() {
        let bundle = BundleAssembler::default().assemble(Vec::new()).unwrap();
        assert!(bundle.is_transaction());
        assert_eq!(bundle.entry_count(), 0);
    }
}

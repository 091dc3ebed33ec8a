#![allow(dead_code)]

use async_trait::async_trait;
use ember_loader::{Emitter, Error, PackageLoader, Result};
use ember_models::Bundle;
use ember_package::{version_matches, FhirPackage, PackageId};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Build a package tar.gz: a manifest plus `(archive path, resource)` members.
pub fn package_archive(
    name: &str,
    version: &str,
    dependencies: &[(&str, &str)],
    members: &[(&str, Value)],
) -> Vec<u8> {
    let deps: serde_json::Map<String, Value> = dependencies
        .iter()
        .map(|(n, v)| (n.to_string(), Value::String(v.to_string())))
        .collect();
    let manifest = json!({
        "name": name,
        "version": version,
        "fhirVersions": ["4.0.1"],
        "dependencies": deps,
    });

    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    let mut append = |path: &str, contents: Vec<u8>| {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, path, contents.as_slice())
            .unwrap();
    };

    append("package/package.json", manifest.to_string().into_bytes());
    for (path, resource) in members {
        append(path, resource.to_string().into_bytes());
    }
    builder.into_inner().unwrap().finish().unwrap()
}

pub fn patient(id: &str) -> Value {
    json!({"resourceType": "Patient", "id": id})
}

pub fn search_bundle(id: &str) -> Value {
    json!({"resourceType": "Bundle", "id": id, "type": "searchset", "entry": []})
}

/// Package with one example patient per id, under `package/example`.
pub fn example_package(name: &str, dependencies: &[(&str, &str)], patient_ids: &[&str]) -> FhirPackage {
    let members: Vec<(String, Value)> = patient_ids
        .iter()
        .map(|id| (format!("package/example/Patient-{}.json", id), patient(id)))
        .collect();
    let members: Vec<(&str, Value)> = members
        .iter()
        .map(|(p, v)| (p.as_str(), v.clone()))
        .collect();
    FhirPackage::from_tar_gz_bytes(&package_archive(name, "1.0.0", dependencies, &members)).unwrap()
}

/// Package source backed by a map; counts every load.
#[derive(Default)]
pub struct InMemoryLoader {
    packages: Mutex<Vec<FhirPackage>>,
    loads: Mutex<HashMap<PackageId, usize>>,
}

impl InMemoryLoader {
    pub fn new(packages: impl IntoIterator<Item = FhirPackage>) -> Self {
        Self {
            packages: Mutex::new(packages.into_iter().collect()),
            loads: Mutex::default(),
        }
    }

    pub fn loads_of(&self, id: &PackageId) -> usize {
        self.loads.lock().unwrap().get(id).copied().unwrap_or(0)
    }

    pub fn total_loads(&self) -> usize {
        self.loads.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl PackageLoader for InMemoryLoader {
    async fn load_package(&self, id: &PackageId) -> Result<FhirPackage> {
        *self.loads.lock().unwrap().entry(id.clone()).or_default() += 1;

        self.packages
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.name() == id.name && version_matches(p.version(), &id.version))
            .cloned()
            .ok_or_else(|| Error::NotFound {
                name: id.name.clone(),
                version: id.version.clone(),
            })
    }

    async fn install_package(&self, archive: &[u8]) -> Result<FhirPackage> {
        let package = FhirPackage::from_tar_gz_bytes(archive)?;
        self.packages.lock().unwrap().push(package.clone());
        Ok(package)
    }
}

/// Emitter that records what it was asked to do.
pub struct RecordingEmitter {
    ready: bool,
    pub waits: Mutex<Vec<Duration>>,
    pub sent: Mutex<Vec<Bundle>>,
}

impl RecordingEmitter {
    pub fn ready() -> Self {
        Self {
            ready: true,
            waits: Mutex::default(),
            sent: Mutex::default(),
        }
    }

    pub fn never_ready() -> Self {
        Self {
            ready: false,
            ..Self::ready()
        }
    }

    pub fn sent(&self) -> Vec<Bundle> {
        self.sent.lock().unwrap().clone()
    }

    pub fn wait_count(&self) -> usize {
        self.waits.lock().unwrap().len()
    }
}

#[async_trait]
impl Emitter for RecordingEmitter {
    fn endpoint(&self) -> &str {
        "http://fhir.test/base"
    }

    fn requires_readiness(&self) -> bool {
        true
    }

    async fn wait_until_ready(&self, max_wait: Duration) -> Result<bool> {
        self.waits.lock().unwrap().push(max_wait);
        Ok(self.ready)
    }

    async fn send(&self, bundle: &Bundle) -> Result<Option<Value>> {
        self.sent.lock().unwrap().push(bundle.clone());
        Ok(None)
    }
}

/// `resource.id` of every entry, in order.
pub fn entry_ids(bundle: &Bundle) -> Vec<String> {
    bundle
        .entries()
        .iter()
        .filter_map(|e| e.resource.as_ref()?.get("id")?.as_str().map(str::to_string))
        .collect()
}

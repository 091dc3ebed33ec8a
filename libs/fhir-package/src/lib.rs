//! Canonical models for the FHIR NPM Package specification.
//!
//! Provides serde-friendly representations of `package.json` manifests and
//! `.index.json` files, plus [`FhirPackage`], an immutable in-memory view of a
//! package archive organised into named folders (`package`, `package/example`, ...).

use flate2::read::GzDecoder;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use tar::Archive;
use thiserror::Error;

pub type PackageName = String;
pub type Version = String;
pub type VersionReference = String;
pub type Url = String;

/// Archive path of the package manifest.
pub const MANIFEST_PATH: &str = "package/package.json";
/// Folder holding conformance resources at the package root.
pub const ROOT_FOLDER: &str = "package";
/// Folder holding example instances.
pub const EXAMPLE_FOLDER: &str = "package/example";

const INDEX_FILE: &str = ".index.json";
const UNKNOWN_TYPE: &str = "Unknown";

/// Split a version into base and optional label ("1.2.3-ballot" → ("1.2.3", Some("ballot"))).
pub fn parse_version(version: &str) -> (&str, Option<&str>) {
    match version.split_once('-') {
        Some((base, label)) => (base, Some(label)),
        None => (version, None),
    }
}

/// Check if version matches reference (exact match, patch wildcards like "1.2.x", and label variants).
pub fn version_matches(version: &str, reference: &str) -> bool {
    if version == reference {
        return true;
    }

    if let Some(prefix) = reference.strip_suffix(".x") {
        if let Some(suffix) = version.strip_prefix(&format!("{}.", prefix)) {
            let (patch, _) = parse_version(suffix);
            return patch.parse::<u32>().is_ok();
        }
        return false;
    }

    let (base_version, _) = parse_version(version);
    let (base_reference, _) = parse_version(reference);
    base_version == base_reference
}

/// Package identity: `name#version`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageId {
    pub name: PackageName,
    pub version: VersionReference,
}

impl PackageId {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// True when the version names one concrete release rather than a wildcard or keyword.
    pub fn is_exact(&self) -> bool {
        !self.version.ends_with(".x")
            && !matches!(self.version.as_str(), "" | "current" | "latest" | "dev")
            && self.version.chars().next().is_some_and(|c| c.is_ascii_digit())
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.version)
    }
}

impl FromStr for PackageId {
    type Err = PackageError;

    /// Parses `name#version`; a bare `name` resolves to the `current` release.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (name, version) = match s.split_once('#') {
            Some((name, version)) => (name.trim(), version.trim()),
            None => (s, "current"),
        };

        if name.is_empty() {
            return Err(PackageError::ValidationError(format!(
                "Package id '{}' has no name",
                s
            )));
        }
        if version.is_empty() {
            return Err(PackageError::ValidationError(format!(
                "Package id '{}' has an empty version",
                s
            )));
        }

        Ok(Self::new(name, version))
    }
}

/// FHIR NPM Package manifest (`package/package.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    pub name: PackageName,
    pub version: Version,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical: Option<Url>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<Url>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fhir_versions: Vec<String>,
    /// Declared dependencies, in declaration order.
    #[serde(default)]
    pub dependencies: IndexMap<PackageName, VersionReference>,
    #[serde(default)]
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(flatten, default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl PackageManifest {
    /// Minimal manifest with the given identity and no dependencies.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            canonical: None,
            url: None,
            title: None,
            description: String::new(),
            fhir_versions: Vec::new(),
            dependencies: IndexMap::new(),
            author: String::new(),
            license: None,
            extra: Map::new(),
        }
    }

    /// Check the fields a package identity needs.
    pub fn validate(&self) -> Result<(), PackageError> {
        if self.name.is_empty() {
            return Err(PackageError::ValidationError(
                "Package name required".into(),
            ));
        }
        if self.version.is_empty() {
            return Err(PackageError::ValidationError(
                "Package version required".into(),
            ));
        }

        Ok(())
    }

    pub fn id(&self) -> PackageId {
        PackageId::new(&self.name, &self.version)
    }

    /// Declared dependencies as identities, in declaration order.
    pub fn dependency_ids(&self) -> Vec<PackageId> {
        self.dependencies
            .iter()
            .map(|(name, version)| PackageId::new(name, version))
            .collect()
    }

    /// The FHIR version this package targets.
    ///
    /// Looks at `fhirVersions`, then the legacy `fhir-version-list` field, then the
    /// version of a declared core package dependency.
    pub fn declared_fhir_version(&self) -> Option<String> {
        if let Some(version) = self.fhir_versions.first() {
            return Some(version.clone());
        }

        if let Some(version) = self
            .extra
            .get("fhir-version-list")
            .and_then(Value::as_array)
            .and_then(|list| list.first())
            .and_then(Value::as_str)
        {
            return Some(version.to_string());
        }

        self.dependencies
            .iter()
            .find(|(name, _)| is_core_package(name))
            .map(|(_, version)| version.clone())
    }
}

fn is_core_package(name: &str) -> bool {
    name == "hl7.fhir.core" || (name.starts_with("hl7.fhir.r") && name.ends_with(".core"))
}

/// Package index (`.index.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageIndex {
    #[serde(rename = "index-version")]
    pub index_version: u8,
    pub files: Vec<IndexedFile>,
    #[serde(flatten, default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

/// File entry in package index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedFile {
    pub filename: String,
    #[serde(rename = "resourceType")]
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(flatten, default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid structure: {0}")]
    InvalidStructure(String),
    #[error("Missing file: {0}")]
    MissingFile(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type PackageResult<T> = Result<T, PackageError>;

/// File names of one folder, grouped by resource type.
///
/// Groups are ordered by resource type, files within a group by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderListing {
    types: BTreeMap<String, Vec<String>>,
}

impl FolderListing {
    pub fn types(&self) -> &BTreeMap<String, Vec<String>> {
        &self.types
    }

    /// All file names, flattened in group order.
    pub fn file_names(&self) -> Vec<&str> {
        self.types
            .values()
            .flat_map(|files| files.iter().map(String::as_str))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.types.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn build(files: &BTreeMap<String, Vec<u8>>) -> Self {
        let indexed_types: HashMap<String, String> = files
            .get(INDEX_FILE)
            .and_then(|bytes| parse_json::<PackageIndex>(bytes).ok())
            .map(|index| {
                index
                    .files
                    .into_iter()
                    .map(|f| (f.filename, f.resource_type))
                    .collect()
            })
            .unwrap_or_default();

        let mut types: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for name in files.keys().filter(|name| is_listable(name)) {
            let resource_type = indexed_types
                .get(name)
                .cloned()
                .unwrap_or_else(|| type_from_file_name(name));
            types.entry(resource_type).or_default().push(name.clone());
        }
        // BTreeMap key order already sorts names within each group.
        Self { types }
    }
}

fn is_listable(file_name: &str) -> bool {
    file_name.ends_with(".json") && !file_name.starts_with('.') && file_name != "package.json"
}

/// `Patient-example.json` → `Patient`.
fn type_from_file_name(file_name: &str) -> String {
    file_name
        .split_once('-')
        .map(|(prefix, _)| prefix)
        .filter(|prefix| prefix.chars().next().is_some_and(|c| c.is_ascii_uppercase()))
        .unwrap_or(UNKNOWN_TYPE)
        .to_string()
}

/// A directory inside the package archive.
#[derive(Debug, Clone)]
pub struct PackageFolder {
    name: String,
    files: BTreeMap<String, Vec<u8>>,
    listing: FolderListing,
}

impl PackageFolder {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn listing(&self) -> &FolderListing {
        &self.listing
    }

    pub fn fetch_file(&self, file_name: &str) -> PackageResult<&[u8]> {
        self.files
            .get(file_name)
            .map(Vec::as_slice)
            .ok_or_else(|| PackageError::MissingFile(format!("{}/{}", self.name, file_name)))
    }
}

/// Loaded FHIR package: manifest and the archive contents by folder.
///
/// Immutable once built; member files are kept as raw bytes and decoded by the caller.
#[derive(Debug, Clone)]
pub struct FhirPackage {
    pub manifest: PackageManifest,
    folders: BTreeMap<String, PackageFolder>,
}

impl FhirPackage {
    /// Build a package from a manifest and archive-relative file paths.
    ///
    /// Paths look like `package/example/Patient-a.json`; the manifest itself need not be included.
    pub fn new<P, B>(manifest: PackageManifest, files: impl IntoIterator<Item = (P, B)>) -> Self
    where
        P: Into<String>,
        B: Into<Vec<u8>>,
    {
        let file_map: BTreeMap<String, Vec<u8>> = files
            .into_iter()
            .map(|(path, bytes)| (normalize_path(&path.into()), bytes.into()))
            .collect();
        Self::assemble(manifest, file_map)
    }

    /// Load package from tar.gz reader.
    pub fn from_tar_gz<R: Read>(reader: R) -> PackageResult<Self> {
        let mut archive = Archive::new(GzDecoder::new(reader));
        let mut file_map: BTreeMap<String, Vec<u8>> = BTreeMap::new();

        for entry in archive.entries()? {
            let mut entry = entry?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let path = normalize_path(&entry.path()?.to_string_lossy());
            let mut contents = Vec::new();
            entry.read_to_end(&mut contents)?;
            file_map.insert(path, contents);
        }

        Self::from_file_map(file_map)
    }

    /// Load package from tar.gz bytes.
    pub fn from_tar_gz_bytes(bytes: &[u8]) -> PackageResult<Self> {
        Self::from_tar_gz(std::io::Cursor::new(bytes))
    }

    /// Load package from an extracted `package/` directory.
    pub fn from_directory(package_dir: &Path) -> PackageResult<Self> {
        if !package_dir.join("package.json").exists() {
            return Err(PackageError::MissingFile(
                package_dir.join("package.json").to_string_lossy().into(),
            ));
        }

        let prefix = package_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| ROOT_FOLDER.to_string());

        let mut file_map = BTreeMap::new();
        collect_directory(package_dir, &prefix, &mut file_map)?;
        Self::from_file_map(file_map)
    }

    fn from_file_map(file_map: BTreeMap<String, Vec<u8>>) -> PackageResult<Self> {
        let manifest = file_map
            .get(MANIFEST_PATH)
            .ok_or_else(|| PackageError::MissingFile(MANIFEST_PATH.to_string()))
            .and_then(|bytes| parse_json::<PackageManifest>(bytes))?;
        manifest.validate()?;

        Ok(Self::assemble(manifest, file_map))
    }

    fn assemble(manifest: PackageManifest, file_map: BTreeMap<String, Vec<u8>>) -> Self {
        let mut grouped: BTreeMap<String, BTreeMap<String, Vec<u8>>> = BTreeMap::new();
        for (path, contents) in file_map {
            let Some((folder, file_name)) = path.rsplit_once('/') else {
                continue;
            };
            grouped
                .entry(folder.to_string())
                .or_default()
                .insert(file_name.to_string(), contents);
        }

        let folders = grouped
            .into_iter()
            .map(|(name, files)| {
                let listing = FolderListing::build(&files);
                let folder = PackageFolder {
                    name: name.clone(),
                    files,
                    listing,
                };
                (name, folder)
            })
            .collect();

        Self { manifest, folders }
    }

    pub fn id(&self) -> PackageId {
        self.manifest.id()
    }

    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    pub fn version(&self) -> &str {
        &self.manifest.version
    }

    pub fn folder_names(&self) -> impl Iterator<Item = &str> {
        self.folders.keys().map(String::as_str)
    }

    pub fn folder(&self, name: &str) -> Option<&PackageFolder> {
        self.folders.get(name)
    }

    pub fn list_folder(&self, name: &str) -> Option<&FolderListing> {
        self.folder(name).map(PackageFolder::listing)
    }

    pub fn fetch_file(&self, folder: &str, file_name: &str) -> PackageResult<&[u8]> {
        self.folder(folder)
            .ok_or_else(|| PackageError::MissingFile(format!("{}/{}", folder, file_name)))?
            .fetch_file(file_name)
    }
}

fn normalize_path(path: &str) -> String {
    path.replace('\\', "/").trim_start_matches("./").to_string()
}

fn collect_directory(
    dir: &Path,
    prefix: &str,
    file_map: &mut BTreeMap<String, Vec<u8>>,
) -> PackageResult<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let key = format!("{}/{}", prefix, name);
        if path.is_dir() {
            collect_directory(&path, &key, file_map)?;
        } else {
            file_map.insert(key, fs::read(&path)?);
        }
    }
    Ok(())
}

fn parse_json<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> PackageResult<T> {
    let cleaned = clean_bytes(bytes)?;
    Ok(serde_json::from_str(&cleaned)?)
}

fn clean_bytes(bytes: &[u8]) -> PackageResult<String> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    let content = std::str::from_utf8(bytes)
        .map_err(|e| PackageError::InvalidStructure(format!("Invalid UTF-8: {}", e)))?;

    Ok(content
        .chars()
        .filter(|&c| matches!(c, '\t' | '\n' | '\r') || (c >= ' ' && c != '\x7F'))
        .collect::<String>()
        .trim()
        .to_string())
}

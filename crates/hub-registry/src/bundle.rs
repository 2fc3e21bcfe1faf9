//! In-memory package bundles.
//!
//! A bundle is a package with every file already fetched and digested, plus an
//! annotated copy of its manifest. It backs the SDK's load path (hand the
//! bytes to a program loader without touching the destination filesystem)
//! and republishing.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tempfile::TempDir;
use tracing::debug;

use crate::error::{RegistryError, Result};
use crate::integrity::{self, ContentHash};
use crate::manifest::{PackageEntry, PackageId};
use crate::publish::{PublishFile, PublishRequest};
use crate::resolver::{normalize_relative, resolve_source};
use crate::transport::{Location, Transport};

/// One fetched file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleFile {
    /// Source as declared in the manifest.
    pub source: String,
    /// Normalized install target.
    pub target: String,
    /// File contents.
    pub content: Vec<u8>,
    /// SHA-256 of `content`.
    pub sha256: ContentHash,
}

/// A package with all of its files loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageBundle {
    /// Package identifier.
    pub id: PackageId,
    /// Manifest annotated with targets, digests, `slug` and `hash`.
    pub manifest: Value,
    /// Files in manifest order.
    pub files: Vec<BundleFile>,
}

/// Fetch every file of `entry` and build a bundle.
///
/// Unlike install, loading is all-or-nothing: any fetch or integrity failure
/// aborts the load.
pub fn load(
    entry: &PackageEntry,
    id: &PackageId,
    base: &Location,
    transport: &dyn Transport,
) -> Result<PackageBundle> {
    let author = if entry.author.is_empty() {
        id.author.clone()
    } else {
        entry.author.clone()
    };
    let id = PackageId::new(author, entry.name.clone());

    let mut files = Vec::with_capacity(entry.files.len());
    let mut annotated_files = Vec::with_capacity(entry.files.len());
    for file in &entry.files {
        let location = resolve_source(&file.source, base)?;
        let target = normalize_relative(file.target_or_default())?;
        let content = transport.fetch(&location)?;
        integrity::verify_declared(&target, &content, file.digest())?;
        let sha256 = ContentHash::compute(&content);
        debug!("loaded {target} ({} bytes)", content.len());

        let mut annotated = serde_json::to_value(file)?;
        annotated["target"] = Value::String(target.clone());
        annotated["sha256"] = Value::String(sha256.to_string());
        annotated_files.push(annotated);

        files.push(BundleFile {
            source: file.source.clone(),
            target,
            content,
            sha256,
        });
    }

    let mut manifest = serde_json::to_value(entry)?;
    manifest["files"] = Value::Array(annotated_files);
    manifest["author"] = Value::String(id.author.clone());
    manifest["name"] = Value::String(id.name.clone());
    manifest["slug"] = Value::String(id.to_string());
    let hash = ContentHash::combine(files.iter().map(|f| &f.sha256));
    manifest["hash"] = Value::String(hash.to_string());

    Ok(PackageBundle {
        id,
        manifest,
        files,
    })
}

impl PackageBundle {
    /// The manifest's metadata object (empty when absent).
    pub fn metadata(&self) -> Map<String, Value> {
        match self.manifest.get("metadata") {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        }
    }

    /// Pick one file by target.
    ///
    /// Exact target match first, then the first file whose target ends with
    /// the requested file name. Without a target the first file is returned.
    pub fn select_file(&self, target: Option<&str>) -> Result<&BundleFile> {
        let not_found = |wanted: &str| RegistryError::PackageNotFound {
            identifier: format!("{}:{wanted}", self.id),
        };

        let Some(target) = target else {
            return self.files.first().ok_or_else(|| not_found("<any file>"));
        };

        if let Some(exact) = self.files.iter().find(|f| f.target == target) {
            return Ok(exact);
        }
        let basename = target.rsplit('/').next().unwrap_or(target);
        self.files
            .iter()
            .find(|f| f.target.ends_with(basename))
            .ok_or_else(|| not_found(target))
    }

    /// Stage this bundle's files on disk and build a request to republish it.
    ///
    /// The returned directory holds the staged files and must outlive the
    /// publish call.
    pub fn to_publish_request(&self, credential: Option<String>) -> Result<(PublishRequest, TempDir)> {
        let staging = tempfile::tempdir()?;
        let mut files = Vec::with_capacity(self.files.len());
        for file in &self.files {
            let path = staged_path(staging.path(), &file.target);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| RegistryError::file(parent, e))?;
            }
            std::fs::write(&path, &file.content).map_err(|e| RegistryError::file(&path, e))?;
            files.push(PublishFile::with_target(path, file.target.clone()));
        }

        let text = |key: &str| {
            self.manifest
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let tags: BTreeSet<String> = self
            .manifest
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| tags.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default();

        let request = PublishRequest {
            author: self.id.author.clone(),
            name: self.id.name.clone(),
            version: text("version"),
            description: text("description"),
            tags,
            metadata: self.metadata(),
            files,
            credential,
        };
        Ok((request, staging))
    }
}

fn staged_path(root: &Path, target: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    path.extend(target.split('/'));
    path
}

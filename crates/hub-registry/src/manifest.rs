//! Registry manifest model.
//!
//! A registry serves one JSON document, `{"packages": [...]}`, describing every
//! package and the files it ships. Entries are validated on load. Unknown
//! entry fields are folded into `metadata`; unknown file fields are kept in
//! `extra`. Either way they are written back on serialization.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{RegistryError, Result};

/// A parsed registry index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryIndex {
    /// Packages in manifest order.
    pub packages: Vec<PackageEntry>,
    /// Unrecognised top-level fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One package in the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageEntry {
    /// Package name (unique within its author namespace).
    pub name: String,
    /// Publishing author; empty in single-namespace registries.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub author: String,
    /// Version string. Opaque: never parsed or ordered.
    pub version: String,
    /// Short description.
    pub description: String,
    /// Search tags.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    /// Free-form metadata, passed through untouched.
    #[serde(default, deserialize_with = "object_or_empty")]
    pub metadata: Map<String, Value>,
    /// Files shipped by this package.
    pub files: Vec<FileEntry>,
    /// Unrecognised fields whose name is already taken by a `metadata` key.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One file artifact declared by a package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Path or URL relative to the registry base location.
    pub source: String,
    /// Install path relative to the destination root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Hex content digest; see [`crate::integrity`] for the algorithm convention.
    #[serde(default, alias = "digest", skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    /// Unrecognised fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A package address: `author/name`, or a bare `name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageId {
    /// Author namespace; empty when not given.
    pub author: String,
    /// Package name.
    pub name: String,
}

impl PackageId {
    /// Build an identifier from its parts.
    pub fn new(author: impl Into<String>, name: impl Into<String>) -> Self {
        PackageId {
            author: author.into(),
            name: name.into(),
        }
    }

    /// Parse `author/name` or `name`. Only the first `/` separates the parts.
    pub fn parse(identifier: &str) -> Result<Self> {
        let identifier = identifier.trim();
        let invalid = || RegistryError::InvalidIdentifier {
            identifier: identifier.to_string(),
        };
        match identifier.split_once('/') {
            Some((author, name)) if !author.is_empty() && !name.is_empty() => {
                Ok(PackageId::new(author, name))
            }
            Some(_) => Err(invalid()),
            None if identifier.is_empty() => Err(invalid()),
            None => Ok(PackageId::new("", identifier)),
        }
    }

    /// Parse an identifier that must carry an author.
    pub fn parse_qualified(identifier: &str) -> Result<Self> {
        let id = PackageId::parse(identifier)?;
        if id.author.is_empty() {
            return Err(RegistryError::InvalidIdentifier {
                identifier: identifier.to_string(),
            });
        }
        Ok(id)
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.author.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.author, self.name)
        }
    }
}

impl RegistryIndex {
    /// Parse and validate a registry manifest.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let document: Value = serde_json::from_slice(raw).map_err(|e| invalid(e.to_string()))?;
        let Value::Object(mut top) = document else {
            return Err(invalid("manifest must be a JSON object"));
        };

        let packages = match top.remove("packages") {
            Some(Value::Array(items)) => items,
            Some(_) => return Err(invalid("'packages' must be an array")),
            None => return Err(invalid("missing top-level 'packages' array")),
        };

        let mut entries: Vec<PackageEntry> = Vec::with_capacity(packages.len());
        for (i, item) in packages.into_iter().enumerate() {
            let entry = PackageEntry::from_value(item)
                .map_err(|detail| invalid(format!("packages[{i}]: {detail}")))?;

            if entries
                .iter()
                .any(|seen| seen.author == entry.author && seen.name == entry.name)
            {
                return Err(invalid(format!(
                    "packages[{i}]: duplicate package '{}'",
                    entry.id()
                )));
            }
            entries.push(entry);
        }

        Ok(RegistryIndex {
            packages: entries,
            extra: top,
        })
    }

    /// Look up a package by author and name.
    ///
    /// With an empty author the name alone must identify exactly one package.
    pub fn find(&self, author: &str, name: &str) -> Result<&PackageEntry> {
        if !author.is_empty() {
            return self
                .packages
                .iter()
                .find(|p| p.author == author && p.name == name)
                .ok_or_else(|| RegistryError::PackageNotFound {
                    identifier: format!("{author}/{name}"),
                });
        }

        let matches: Vec<&PackageEntry> = self.packages.iter().filter(|p| p.name == name).collect();
        match matches.as_slice() {
            [] => Err(RegistryError::PackageNotFound {
                identifier: name.to_string(),
            }),
            [only] => Ok(only),
            many => Err(RegistryError::AmbiguousPackage {
                name: name.to_string(),
                authors: many.iter().map(|p| p.author.clone()).collect(),
            }),
        }
    }

    /// Look up a package by identifier.
    pub fn find_id(&self, id: &PackageId) -> Result<&PackageEntry> {
        self.find(&id.author, &id.name)
    }

    /// Case-insensitive search over name, author, description and tags.
    pub fn search(&self, query: &str) -> Vec<&PackageEntry> {
        let query = query.to_lowercase();
        self.packages
            .iter()
            .filter(|p| {
                p.name.to_lowercase().contains(&query)
                    || p.author.to_lowercase().contains(&query)
                    || p.description.to_lowercase().contains(&query)
                    || p.tags.iter().any(|t| t.to_lowercase().contains(&query))
            })
            .collect()
    }

    /// Serialize this index to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl PackageEntry {
    /// The `(author, name)` identifier of this entry.
    pub fn id(&self) -> PackageId {
        PackageId::new(self.author.clone(), self.name.clone())
    }

    /// Parse and validate a single package entry, as served by
    /// `GET /api/packages/<author>/<name>`.
    pub fn from_json(raw: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(raw).map_err(|e| invalid(e.to_string()))?;
        PackageEntry::from_value(value).map_err(invalid)
    }

    fn from_value(value: Value) -> std::result::Result<Self, String> {
        let mut entry: PackageEntry = serde_json::from_value(value).map_err(|e| e.to_string())?;
        entry.fold_unknown_fields();
        entry.validate()?;
        Ok(entry)
    }

    /// Move unknown entry fields into `metadata`. Explicit metadata keys win;
    /// a colliding field stays in `extra`.
    fn fold_unknown_fields(&mut self) {
        for (key, value) in std::mem::take(&mut self.extra) {
            if self.metadata.contains_key(&key) {
                self.extra.insert(key, value);
            } else {
                self.metadata.insert(key, value);
            }
        }
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("'name' must not be empty".to_string());
        }
        if self.files.is_empty() {
            return Err(format!("package '{}' declares no files", self.name));
        }
        if let Some(i) = self.files.iter().position(|f| f.source.trim().is_empty()) {
            return Err(format!("files[{i}]: 'source' must not be empty"));
        }
        Ok(())
    }
}

impl FileEntry {
    /// A file entry with only a source path.
    pub fn new(source: impl Into<String>) -> Self {
        FileEntry {
            source: source.into(),
            target: None,
            sha256: None,
            extra: Map::new(),
        }
    }

    /// The declared target, or the last path segment of the source.
    pub fn target_or_default(&self) -> &str {
        match self.target.as_deref() {
            Some(target) if !target.is_empty() => target,
            _ => self.source.rsplit('/').next().unwrap_or(&self.source),
        }
    }

    /// The declared digest, if any.
    pub fn digest(&self) -> Option<&str> {
        self.sha256.as_deref().filter(|d| !d.trim().is_empty())
    }
}

fn invalid(detail: impl Into<String>) -> RegistryError {
    RegistryError::InvalidManifest {
        detail: detail.into(),
    }
}

fn object_or_empty<'de, D>(deserializer: D) -> std::result::Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}

//! Package publishing workflow.
//!
//! Reads local files, digests them, and submits a single manifest fragment to
//! the registry's `PUT /api/packages/<author>/<name>` endpoint with a bearer
//! credential. A missing credential fails before any file is read. There is no
//! retry: a publish is a deliberate act and a silent second attempt could
//! write twice.

use std::collections::BTreeSet;
use std::path::PathBuf;

use base64::Engine;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::info;

use crate::error::{AuthError, RegistryError, Result, TransportError};
use crate::integrity::ContentHash;
use crate::manifest::{FileEntry, PackageEntry, PackageId};
use crate::resolver::normalize_relative;
use crate::transport::{Location, Transport};

/// A local file to publish and where it installs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishFile {
    /// Local path to read.
    pub path: PathBuf,
    /// Install target relative to the destination root.
    pub target: String,
}

impl PublishFile {
    /// Publish `path` under its own file name.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let target = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        PublishFile { path, target }
    }

    /// Publish `path` under an explicit target.
    pub fn with_target(path: impl Into<PathBuf>, target: impl Into<String>) -> Self {
        PublishFile {
            path: path.into(),
            target: target.into(),
        }
    }
}

/// Everything needed for one publish.
#[derive(Debug, Clone, Default)]
pub struct PublishRequest {
    /// Author namespace.
    pub author: String,
    /// Package name.
    pub name: String,
    /// Version string; `0.0.0` when empty.
    pub version: String,
    /// Short description.
    pub description: String,
    /// Search tags.
    pub tags: BTreeSet<String>,
    /// Free-form metadata, stored verbatim.
    pub metadata: Map<String, Value>,
    /// Files to upload, in order.
    pub files: Vec<PublishFile>,
    /// Bearer credential (developer key).
    pub credential: Option<String>,
}

/// What the registry accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedManifestFragment {
    /// The package entry as submitted, with locally computed digests.
    pub manifest: PackageEntry,
    /// Parsed response body from the backend.
    pub response: Value,
}

#[derive(Serialize)]
struct PublishPayload<'a> {
    manifest: &'a PackageEntry,
    metadata: &'a Map<String, Value>,
    files: Vec<UploadedFile>,
}

#[derive(Serialize)]
struct UploadedFile {
    path: String,
    target: String,
    sha256: String,
    content: String,
    #[serde(rename = "contentType")]
    content_type: &'static str,
}

/// Endpoint that accepts publishes for `id`, relative to a registry base.
pub fn publish_endpoint(base: &Location, id: &PackageId) -> Location {
    base.join(&format!("api/packages/{}/{}", id.author, id.name))
}

/// Publish a package through `transport` to `endpoint`.
///
/// Consumes the request.
pub fn publish(
    request: PublishRequest,
    endpoint: &Location,
    transport: &dyn Transport,
) -> Result<PublishedManifestFragment> {
    let credential = request
        .credential
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or(AuthError::MissingCredential)?
        .to_string();

    let id = PackageId::new(request.author.trim(), request.name.trim());
    if id.author.is_empty() || id.name.is_empty() {
        return Err(RegistryError::PublishFailed {
            detail: "package author and name are required".to_string(),
        });
    }
    if request.files.is_empty() {
        return Err(RegistryError::PublishFailed {
            detail: format!("package '{id}' has no files to publish"),
        });
    }

    let mut manifest_files = Vec::with_capacity(request.files.len());
    let mut uploads = Vec::with_capacity(request.files.len());
    for file in &request.files {
        let target = normalize_relative(file.target.trim_start_matches('/'))?;
        let content =
            std::fs::read(&file.path).map_err(|e| RegistryError::file(&file.path, e))?;
        let sha256 = ContentHash::compute(&content);

        let relative = storage_relative(&target, &id.author);
        manifest_files.push(FileEntry {
            target: Some(target.clone()),
            sha256: Some(sha256.to_string()),
            ..FileEntry::new(format!("packages/{}/{}/{relative}", id.author, id.name))
        });
        uploads.push(UploadedFile {
            path: relative.to_string(),
            content_type: guess_content_type(&target),
            target,
            sha256: sha256.to_string(),
            content: base64::engine::general_purpose::STANDARD.encode(&content),
        });
    }

    // `version`, `description` and `tags` in metadata override the request fields.
    let metadata_text = |key: &str| {
        request
            .metadata
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    let version = metadata_text("version").unwrap_or(request.version);
    let version = match version.trim() {
        "" => "0.0.0".to_string(),
        v => v.to_string(),
    };
    let description = metadata_text("description").unwrap_or(request.description);
    let tags = match request.metadata.get("tags") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => request.tags,
    };

    let manifest = PackageEntry {
        name: id.name.clone(),
        author: id.author.clone(),
        version,
        description,
        tags,
        metadata: request.metadata,
        files: manifest_files,
        extra: Map::new(),
    };

    let body = serde_json::to_vec(&PublishPayload {
        manifest: &manifest,
        metadata: &manifest.metadata,
        files: uploads,
    })?;

    info!(
        "publishing {id} v{} ({} files) to {endpoint}",
        manifest.version,
        manifest.files.len()
    );
    let response = transport
        .write(endpoint, &body, &credential)
        .map_err(classify_failure)?;

    let response = serde_json::from_slice(&response).map_err(|e| RegistryError::PublishFailed {
        detail: format!("registry returned invalid JSON: {e}"),
    })?;

    Ok(PublishedManifestFragment { manifest, response })
}

/// Target path inside the package's storage prefix.
fn storage_relative<'a>(target: &'a str, author: &str) -> &'a str {
    match target.strip_prefix(author).and_then(|rest| rest.strip_prefix('/')) {
        Some(rest) if !rest.is_empty() => rest,
        _ => target,
    }
}

fn classify_failure(error: TransportError) -> RegistryError {
    match error {
        TransportError::Status { status, body, .. } if status == 401 || status == 403 => {
            AuthError::Rejected { status, body }.into()
        }
        other => RegistryError::PublishFailed {
            detail: other.to_string(),
        },
    }
}

/// MIME type sent with an uploaded file.
pub fn guess_content_type(target: &str) -> &'static str {
    let ext = target.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("json") => "application/json",
        Some("py") => "text/x-python",
        Some("md") => "text/markdown",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

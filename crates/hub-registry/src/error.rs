//! Registry error types.

use std::path::PathBuf;

use crate::install::FileOutcome;

/// Errors that can occur during registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Malformed registry manifest.
    #[error("invalid manifest: {detail}")]
    InvalidManifest { detail: String },

    /// Package not present in the index.
    #[error("package not found: {identifier}")]
    PackageNotFound { identifier: String },

    /// A bare package name matched entries from several authors.
    #[error("package name '{name}' is ambiguous (published by: {}); use 'author/{name}'", .authors.join(", "))]
    AmbiguousPackage { name: String, authors: Vec<String> },

    /// Identifier is not of the form `author/name` or `name`.
    #[error("invalid package identifier '{identifier}': expected 'author/name'")]
    InvalidIdentifier { identifier: String },

    /// A source or target path would escape its root.
    #[error("unsafe path '{path}': {detail}")]
    UnsafePath { path: String, detail: String },

    /// Integrity check failure.
    #[error("integrity check failed for '{target}': expected {expected}, got {actual}")]
    IntegrityFailure {
        target: String,
        expected: String,
        actual: String,
    },

    /// Declared digest is not a recognised hex digest.
    #[error("malformed digest '{digest}' for '{target}'")]
    MalformedDigest { target: String, digest: String },

    /// Fetch or write failure in a registry transport.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Missing or rejected publish credential.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Publish error.
    #[error("publish failed: {detail}")]
    PublishFailed { detail: String },

    /// Every file of a package failed to install.
    #[error("install of '{package}' failed: {}", summarize_failures(.failures))]
    InstallFailed {
        package: String,
        failures: Vec<FileOutcome>,
    },

    /// Local file could not be read or written.
    #[error("I/O error at {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RegistryError {
    /// Whether this error belongs to the publish family.
    ///
    /// Authentication failures are a kind of publish failure.
    pub fn is_publish_failure(&self) -> bool {
        matches!(self, RegistryError::Auth(_) | RegistryError::PublishFailed { .. })
    }

    pub(crate) fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RegistryError::File {
            path: path.into(),
            source,
        }
    }
}

fn summarize_failures(failures: &[FileOutcome]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors raised by a [`Transport`](crate::transport::Transport).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Local file could not be read.
    #[error("cannot read '{location}': {source}")]
    Read {
        location: String,
        #[source]
        source: std::io::Error,
    },

    /// The backend does not accept writes.
    #[error("registry at '{location}' is read-only")]
    ReadOnly { location: String },

    /// Request never produced a response.
    #[error("request to '{location}' failed: {source}")]
    Request {
        location: String,
        #[source]
        source: reqwest::Error,
    },

    /// Non-success HTTP status.
    #[error("HTTP {status} from '{location}': {body}")]
    Status {
        location: String,
        status: u16,
        body: String,
    },
}

/// Authentication failures on publish.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No credential was supplied.
    #[error("developer key missing: set HUB_DEV_KEY or pass a key explicitly")]
    MissingCredential,

    /// The backend refused the credential.
    #[error("registry rejected the developer key (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

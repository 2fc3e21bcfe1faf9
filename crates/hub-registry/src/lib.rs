//! Package hub registry engine.
//!
//! Parses registry manifests, resolves package files against the registry's
//! base location, verifies their digests, installs them into a destination
//! directory, and publishes new packages back to the registry. Supports a
//! local filesystem backend (read-only) and an HTTP backend.
//!
//! # Architecture
//!
//! - **Manifest**: the `{"packages": [...]}` index and its entries
//! - **Resolver**: turns file entries into an install plan, rejecting unsafe paths
//! - **Integrity**: digest verification for fetched bytes
//! - **Install**: best-effort writer with an overwrite policy
//! - **Publish**: authenticated manifest submission
//! - **Transport**: byte access to local or HTTP registries
//!
//! [`RegistryClient`] ties these together for the CLI and SDK callers.

pub mod bundle;
pub mod client;
pub mod error;
pub mod install;
pub mod integrity;
pub mod manifest;
pub mod publish;
pub mod resolver;
pub mod transport;

// Re-exports for convenience.
pub use bundle::{BundleFile, PackageBundle};
pub use client::RegistryClient;
pub use error::{AuthError, RegistryError, Result, TransportError};
pub use install::{install, FailureReason, FileOutcome, FileStatus, InstallOptions, InstallReport};
pub use integrity::{verify, ContentHash, DigestAlgorithm};
pub use manifest::{FileEntry, PackageEntry, PackageId, RegistryIndex};
pub use publish::{publish, PublishFile, PublishRequest, PublishedManifestFragment};
pub use resolver::{resolve, InstallPlan, PlannedFile};
pub use transport::{HttpTransport, LocalTransport, Location, RoutingTransport, Transport};

/// Directory of the sample registry shipped with this crate.
pub fn sample_registry() -> std::path::PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("sample_registry")
}

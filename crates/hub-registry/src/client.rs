//! Registry client.
//!
//! Opens a registry location and exposes lookup, install, load and publish
//! against it. Each fetch goes to the transport matching that location's
//! shape, so a local index may point at remote file sources. Every call fetches a fresh
//! index; nothing is cached between calls.

use std::path::Path;

use tracing::{debug, info};

use crate::bundle::{self, PackageBundle};
use crate::error::{RegistryError, Result, TransportError};
use crate::install::{self, InstallOptions, InstallReport};
use crate::manifest::{PackageEntry, PackageId, RegistryIndex};
use crate::publish::{self, PublishRequest, PublishedManifestFragment};
use crate::resolver::{self, InstallPlan};
use crate::transport::{self, Location, Transport};

/// A handle on one registry.
pub struct RegistryClient {
    index: Location,
    base: Location,
    transport: Box<dyn Transport>,
}

impl RegistryClient {
    /// Open the registry at `location` (URL, index document, or directory).
    pub fn open(location: &str) -> Result<Self> {
        let location = Location::parse(location);
        let transport = transport::open(&location)?;
        Ok(Self::with_transport(location, transport))
    }

    /// Open a registry with an explicit transport.
    pub fn with_transport(location: Location, transport: Box<dyn Transport>) -> Self {
        let (index, base) = location.registry_parts();
        debug!("registry index {index}, base {base}");
        RegistryClient {
            index,
            base,
            transport,
        }
    }

    /// Location of the index document.
    pub fn index_location(&self) -> &Location {
        &self.index
    }

    /// Base that relative file sources resolve against.
    pub fn base(&self) -> &Location {
        &self.base
    }

    /// Fetch and parse the registry index.
    pub fn index(&self) -> Result<RegistryIndex> {
        let raw = self.transport.fetch(&self.index)?;
        let index = RegistryIndex::parse(&raw)?;
        debug!("{} packages in {}", index.packages.len(), self.index);
        Ok(index)
    }

    /// Look up a package by `author/name` or bare `name`.
    pub fn find(&self, identifier: &str) -> Result<PackageEntry> {
        let id = PackageId::parse(identifier)?;
        self.index()?.find_id(&id).cloned()
    }

    /// Fetch a single package entry.
    ///
    /// HTTP registries answer from `GET /api/packages/<author>/<name>`; local
    /// registries from the index.
    pub fn fetch_entry(&self, id: &PackageId) -> Result<PackageEntry> {
        if !self.base.is_remote() || id.author.is_empty() {
            return self.index()?.find_id(id).cloned();
        }

        let location = publish::publish_endpoint(&self.base, id);
        let raw = match self.transport.fetch(&location) {
            Ok(raw) => raw,
            Err(TransportError::Status { status: 404, .. }) => {
                return Err(RegistryError::PackageNotFound {
                    identifier: id.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        PackageEntry::from_json(&raw)
    }

    /// Resolve the install plan for a package into `destination`.
    pub fn plan(&self, identifier: &str, destination: &Path) -> Result<InstallPlan> {
        let entry = self.find(identifier)?;
        resolver::resolve(&entry, &self.base, destination)
    }

    /// Install a package into `destination`.
    pub fn install(
        &self,
        identifier: &str,
        destination: &Path,
        options: InstallOptions,
    ) -> Result<InstallReport> {
        let plan = self.plan(identifier, destination)?;
        install::install(&plan, self.transport.as_ref(), options)
    }

    /// Fetch a package's files into memory.
    pub fn load(&self, identifier: &str) -> Result<PackageBundle> {
        let id = PackageId::parse(identifier)?;
        let entry = self.index()?.find_id(&id)?.clone();
        bundle::load(&entry, &id, &self.base, self.transport.as_ref())
    }

    /// Publish a package to this registry.
    pub fn publish(&self, request: PublishRequest) -> Result<PublishedManifestFragment> {
        let id = PackageId::new(request.author.trim(), request.name.trim());
        let endpoint = publish::publish_endpoint(&self.base, &id);
        let fragment = publish::publish(request, &endpoint, self.transport.as_ref())?;
        info!("published {id} v{}", fragment.manifest.version);
        Ok(fragment)
    }
}

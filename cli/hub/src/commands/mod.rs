//! CLI command implementations.

pub mod install;
pub mod list;
pub mod publish;
pub mod show;

use anyhow::{Context, Result};
use hub_registry::RegistryClient;

use crate::config::Settings;

/// Open the registry named by `settings`.
pub fn open_registry(settings: &Settings) -> Result<RegistryClient> {
    RegistryClient::open(&settings.registry)
        .with_context(|| format!("opening registry {}", settings.registry))
}

//! Runtime settings for the CLI.
//!
//! Settings are assembled once per invocation from, lowest precedence first:
//! built-in defaults, a TOML config file, environment variables, and
//! command-line flags. The result is passed explicitly into every command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Registry used when nothing else is configured.
pub const DEFAULT_REGISTRY_URL: &str = "https://api.dspyhub.com/index.json";

/// Registry location override.
pub const REGISTRY_ENV: &str = "HUB_REGISTRY";
/// Config file path override.
pub const CONFIG_ENV: &str = "HUB_CONFIG";
/// Developer key used for publishing.
pub const DEV_KEY_ENV: &str = "HUB_DEV_KEY";

/// Resolved settings for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Registry location (URL, index document, or directory).
    pub registry: String,
    /// Developer key for publishing.
    pub dev_key: Option<String>,
    /// Default install destination.
    pub destination: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            registry: DEFAULT_REGISTRY_URL.to_string(),
            dev_key: None,
            destination: PathBuf::from("."),
        }
    }
}

/// The `config.toml` file. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub registry: Option<String>,
    #[serde(default)]
    pub dev_key: Option<String>,
    #[serde(default)]
    pub destination: Option<PathBuf>,
}

impl ConfigFile {
    /// Parse a config file from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).context("parsing hub config")
    }

    /// Load a config file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("in {}", path.display()))
    }
}

/// Values supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub registry: Option<String>,
    pub dev_key: Option<String>,
    pub destination: Option<PathBuf>,
}

/// Assemble settings from the process environment and `overrides`.
pub fn load(overrides: Overrides) -> Result<Settings> {
    load_with(overrides, |key| std::env::var(key).ok())
}

/// Assemble settings, reading environment variables through `env`.
pub fn load_with(overrides: Overrides, env: impl Fn(&str) -> Option<String>) -> Result<Settings> {
    let mut settings = Settings::default();

    let explicit = overrides
        .config
        .clone()
        .or_else(|| non_empty(env(CONFIG_ENV)).map(PathBuf::from));
    let file = match explicit {
        Some(path) => Some(ConfigFile::load(&path)?),
        None => match default_config_path() {
            Some(path) if path.is_file() => Some(ConfigFile::load(&path)?),
            _ => None,
        },
    };

    if let Some(file) = file {
        if let Some(registry) = non_empty(file.registry) {
            settings.registry = registry;
        }
        settings.dev_key = non_empty(file.dev_key).or(settings.dev_key);
        if let Some(destination) = file.destination {
            settings.destination = destination;
        }
    }

    if let Some(registry) = non_empty(env(REGISTRY_ENV)) {
        settings.registry = registry;
    }
    if let Some(key) = non_empty(env(DEV_KEY_ENV)) {
        settings.dev_key = Some(key);
    }

    if let Some(registry) = non_empty(overrides.registry) {
        settings.registry = registry;
    }
    if let Some(key) = non_empty(overrides.dev_key) {
        settings.dev_key = Some(key);
    }
    if let Some(destination) = overrides.destination {
        settings.destination = destination;
    }

    tracing::debug!("registry: {}", settings.registry);
    Ok(settings)
}

/// `<config dir>/hub/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("hub").join("config.toml"))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

//! Artifact resolution.
//!
//! Turns a package's file entries into an [`InstallPlan`]: where each file is
//! fetched from and where it lands. Every source and target is checked
//! lexically before the plan is returned, so a single unsafe entry rejects the
//! whole package before anything is fetched or written.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{RegistryError, Result};
use crate::manifest::{PackageEntry, PackageId};
use crate::transport::Location;

/// One file scheduled for installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedFile {
    /// Normalized target, relative to the destination root.
    pub target: String,
    /// Where the bytes are fetched from.
    pub source: Location,
    /// Absolute path the bytes are written to.
    pub destination: PathBuf,
    /// Declared digest, if any.
    pub digest: Option<String>,
}

/// Resolved install instructions for one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPlan {
    /// Package being installed.
    pub package: PackageId,
    /// Package version, for reporting.
    pub version: String,
    /// Directory every destination lives under.
    pub destination_root: PathBuf,
    /// Files in manifest order.
    pub files: Vec<PlannedFile>,
}

/// Resolve every file of `package` against `base` and `destination_root`.
pub fn resolve(
    package: &PackageEntry,
    base: &Location,
    destination_root: &Path,
) -> Result<InstallPlan> {
    let destination_root = absolute(destination_root)?;

    let mut files = Vec::with_capacity(package.files.len());
    for entry in &package.files {
        let source = resolve_source(&entry.source, base)?;

        let target = normalize_relative(entry.target_or_default())?;
        let mut destination = destination_root.clone();
        destination.extend(target.split('/'));

        debug!("planned {source} -> {}", destination.display());
        files.push(PlannedFile {
            target,
            source,
            destination,
            digest: entry.digest().map(str::to_string),
        });
    }

    Ok(InstallPlan {
        package: package.id(),
        version: package.version.clone(),
        destination_root,
        files,
    })
}

/// Resolve a file entry's `source` against the registry base.
///
/// Absolute `http(s)://` URLs are used as-is; anything else must stay inside
/// the base.
pub fn resolve_source(source: &str, base: &Location) -> Result<Location> {
    if Location::parse(source).is_remote() {
        Ok(Location::Remote(source.trim().to_string()))
    } else {
        Ok(base.join(&normalize_relative(source)?))
    }
}

/// Normalize a relative path lexically, rejecting anything that would leave
/// its root.
///
/// `.` and empty segments are dropped, `..` removes the previous segment.
/// Both `/` and `\` separate segments. The result is `/`-joined.
pub fn normalize_relative(path: &str) -> Result<String> {
    let unsafe_path = |detail: &str| RegistryError::UnsafePath {
        path: path.to_string(),
        detail: detail.to_string(),
    };

    if path.starts_with(['/', '\\']) || has_drive_prefix(path) {
        return Err(unsafe_path("absolute paths are not allowed"));
    }

    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return Err(unsafe_path("path escapes its root"));
                }
            }
            name => parts.push(name),
        }
    }

    if parts.is_empty() {
        return Err(unsafe_path("path does not name a file"));
    }
    Ok(parts.join("/"))
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

//! `hub list`: tabulate the packages in a registry.

use anyhow::Result;
use hub_registry::{PackageEntry, RegistryIndex};

use super::open_registry;
use crate::config::Settings;

/// Run `hub list [--query <text>]`.
pub fn run(settings: &Settings, query: Option<&str>) -> Result<()> {
    let index = open_registry(settings)?.index()?;
    print!("{}", format_listing(&index, query));
    Ok(())
}

/// Render the listing table, optionally filtered by `query`.
pub fn format_listing(index: &RegistryIndex, query: Option<&str>) -> String {
    let mut packages: Vec<&PackageEntry> = match query {
        Some(q) => index.search(q),
        None => index.packages.iter().collect(),
    };

    if packages.is_empty() {
        return "No packages found.\n".to_string();
    }

    packages.sort_by(|a, b| a.author.cmp(&b.author).then_with(|| a.name.cmp(&b.name)));

    let mut out = format!("{:<32}  {:<10}  {}\n", "PACKAGE", "VERSION", "DESCRIPTION");
    out.push_str(&"-".repeat(80));
    out.push('\n');
    for p in packages {
        let id = if p.author.is_empty() {
            p.name.clone()
        } else {
            p.id().to_string()
        };
        out.push_str(&format!("{id:<32}  {:<10}  {}\n", p.version, p.description));
    }
    out
}

//! `hub show`: print one package entry.

use anyhow::Result;
use hub_registry::PackageEntry;

use super::open_registry;
use crate::config::Settings;

/// Run `hub show <package> [--json]`.
///
/// With `--json` every file is fetched and verified, and the annotated
/// manifest (targets, digests, `slug`, `hash`) is printed.
pub fn run(settings: &Settings, identifier: &str, json: bool) -> Result<()> {
    let client = open_registry(settings)?;
    if json {
        let bundle = client.load(identifier)?;
        println!("{}", serde_json::to_string_pretty(&bundle.manifest)?);
    } else {
        let entry = client.find(identifier)?;
        print!("{}", describe(&entry));
    }
    Ok(())
}

/// Human-readable description of a package entry.
pub fn describe(entry: &PackageEntry) -> String {
    let mut out = format!("Package: {}\n", entry.id());
    out.push_str(&format!("  Version:     {}\n", entry.version));
    if !entry.description.is_empty() {
        out.push_str(&format!("  Description: {}\n", entry.description));
    }
    if !entry.tags.is_empty() {
        let tags: Vec<&str> = entry.tags.iter().map(String::as_str).collect();
        out.push_str(&format!("  Tags:        {}\n", tags.join(", ")));
    }
    if !entry.metadata.is_empty() {
        out.push_str("  Metadata:\n");
        for (key, value) in &entry.metadata {
            out.push_str(&format!("    {key}: {value}\n"));
        }
    }
    out.push_str("  Files:\n");
    for file in &entry.files {
        match file.digest() {
            Some(digest) => out.push_str(&format!(
                "    {} <- {} ({digest})\n",
                file.target_or_default(),
                file.source
            )),
            None => out.push_str(&format!(
                "    {} <- {}\n",
                file.target_or_default(),
                file.source
            )),
        }
    }
    out
}

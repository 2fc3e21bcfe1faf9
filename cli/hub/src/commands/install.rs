//! `hub install`: write a package's files into a destination directory.

use anyhow::Result;
use hub_registry::{InstallOptions, InstallReport, RegistryError};

use super::open_registry;
use crate::config::Settings;

/// Run `hub install <package> [--dest <dir>] [--force]`.
///
/// Partial failures are reported and return success; an install where every
/// file failed is an error.
pub fn run(settings: &Settings, identifier: &str, force: bool) -> Result<()> {
    let client = open_registry(settings)?;
    match client.install(identifier, &settings.destination, InstallOptions { force }) {
        Ok(report) => {
            print!("{}", format_report(&report));
            if report.failed() > 0 {
                tracing::warn!("{} of {} files failed", report.failed(), report.files.len());
            }
            Ok(())
        }
        Err(RegistryError::InstallFailed { package, failures }) => {
            for outcome in &failures {
                println!("  {outcome}");
            }
            Err(RegistryError::InstallFailed { package, failures }.into())
        }
        Err(e) => Err(e.into()),
    }
}

/// One line per file followed by the summary.
pub fn format_report(report: &InstallReport) -> String {
    let mut out = String::new();
    for outcome in &report.files {
        out.push_str(&format!("  {outcome}\n"));
    }
    out.push_str(&format!("{report}\n"));
    out.push_str(&format!("Installed into {}\n", report.destination_root.display()));
    out
}

//! `hub publish`: submit local files as a package.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use hub_registry::{PackageId, PublishFile, PublishRequest};
use serde_json::{Map, Value};

use super::open_registry;
use crate::config::Settings;

/// Raw `hub publish` arguments.
#[derive(Debug, Clone, Default)]
pub struct PublishArgs {
    pub package: String,
    pub files: Vec<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub metadata: Vec<String>,
}

/// Run `hub publish <author/name> --file <path[:target]>...`.
pub fn run(settings: &Settings, args: &PublishArgs) -> Result<()> {
    let request = build_request(args, settings.dev_key.clone())?;
    let client = open_registry(settings)?;
    let fragment = client.publish(request)?;

    println!(
        "Published {} v{} ({} files)",
        fragment.manifest.id(),
        fragment.manifest.version,
        fragment.manifest.files.len()
    );
    println!("{}", serde_json::to_string_pretty(&fragment.response)?);
    Ok(())
}

/// Turn CLI arguments into a publish request.
pub fn build_request(args: &PublishArgs, credential: Option<String>) -> Result<PublishRequest> {
    let id = PackageId::parse_qualified(&args.package)?;

    let files = args
        .files
        .iter()
        .map(String::as_str)
        .map(parse_file_spec)
        .collect::<Result<Vec<_>>>()?;

    let mut metadata = Map::new();
    for entry in &args.metadata {
        let (key, value) = parse_metadata(entry)?;
        metadata.insert(key, value);
    }

    Ok(PublishRequest {
        author: id.author,
        name: id.name,
        version: args.version.clone().unwrap_or_default(),
        description: args.description.clone().unwrap_or_default(),
        tags: args.tags.iter().cloned().collect(),
        metadata,
        files,
        credential,
    })
}

/// Parse `PATH[:TARGET]`. A lone drive letter before the colon is part of the path.
pub fn parse_file_spec(spec: &str) -> Result<PublishFile> {
    if spec.trim().is_empty() {
        bail!("empty --file value");
    }
    match spec.rsplit_once(':') {
        Some((path, target)) if !target.is_empty() && !is_drive_prefix(path) => {
            if path.is_empty() {
                bail!("--file '{spec}' has no path");
            }
            Ok(PublishFile::with_target(PathBuf::from(path), target))
        }
        _ => Ok(PublishFile::new(spec)),
    }
}

fn is_drive_prefix(path: &str) -> bool {
    path.len() == 1 && path.chars().all(|c| c.is_ascii_alphabetic())
}

/// Parse `KEY=VALUE`; VALUE is JSON when it parses, otherwise a string.
pub fn parse_metadata(entry: &str) -> Result<(String, Value)> {
    let (key, raw) = entry
        .split_once('=')
        .with_context(|| format!("metadata '{entry}' is not KEY=VALUE"))?;
    let key = key.trim();
    if key.is_empty() {
        bail!("metadata '{entry}' has an empty key");
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn file_specs() {
        let plain = parse_file_spec("dist/agent.py").unwrap();
        assert_eq!(plain.path, PathBuf::from("dist/agent.py"));
        assert_eq!(plain.target, "agent.py");

        let targeted = parse_file_spec("dist/agent.py:src/agent.py").unwrap();
        assert_eq!(targeted.path, PathBuf::from("dist/agent.py"));
        assert_eq!(targeted.target, "src/agent.py");

        let drive = parse_file_spec("C:agent.py").unwrap();
        assert_eq!(drive.path, PathBuf::from("C:agent.py"));

        assert!(parse_file_spec(":target.py").is_err());
        assert!(parse_file_spec("  ").is_err());
    }

    #[test]
    fn metadata_values() {
        assert_eq!(parse_metadata("lm=\"small\"").unwrap(), ("lm".to_string(), json!("small")));
        assert_eq!(parse_metadata("k=3").unwrap().1, json!(3));
        assert_eq!(parse_metadata("opts={\"a\":true}").unwrap().1, json!({"a": true}));
        assert_eq!(parse_metadata("lm=gpt-4o").unwrap().1, json!("gpt-4o"));
        assert!(parse_metadata("novalue").is_err());
        assert!(parse_metadata("=1").is_err());
    }

    #[test]
    fn request_from_args() {
        let args = PublishArgs {
            package: "me/agent".to_string(),
            files: vec!["a.py".to_string(), "b.json:data/b.json".to_string()],
            version: Some("0.3.0".to_string()),
            description: None,
            tags: vec!["rag".to_string(), "rag".to_string()],
            metadata: vec!["lm=small".to_string()],
        };
        let request = build_request(&args, Some("key".to_string())).unwrap();
        assert_eq!(request.author, "me");
        assert_eq!(request.name, "agent");
        assert_eq!(request.version, "0.3.0");
        assert_eq!(request.tags.len(), 1);
        assert_eq!(request.files[1].target, "data/b.json");
        assert_eq!(request.metadata["lm"], "small");
        assert_eq!(request.credential.as_deref(), Some("key"));
    }

    #[test]
    fn bare_name_is_rejected() {
        let args = PublishArgs {
            package: "agent".to_string(),
            files: vec!["a.py".to_string()],
            ..Default::default()
        };
        assert!(build_request(&args, None).is_err());
    }
}

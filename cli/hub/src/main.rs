//! Hub CLI: install and publish packages from a hub registry.

mod commands;
mod config;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use config::Overrides;

#[derive(Parser)]
#[command(name = "hub", version, about = "Install and publish hub packages")]
struct Cli {
    /// Registry location (URL, index.json path, or registry directory)
    #[arg(long, global = true)]
    registry: Option<String>,
    /// Config file (default: <config dir>/hub/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List packages in the registry
    List {
        /// Only show packages matching this text
        #[arg(long)]
        query: Option<String>,
    },
    /// Show details of a package
    Show {
        /// Package identifier (author/name or name)
        package: String,
        /// Fetch every file and print the annotated manifest as JSON
        #[arg(long)]
        json: bool,
    },
    /// Install a package into a directory
    Install {
        /// Package identifier (author/name or name)
        package: String,
        /// Destination directory (default: current directory)
        #[arg(long)]
        dest: Option<PathBuf>,
        /// Overwrite files that already exist
        #[arg(long)]
        force: bool,
    },
    /// Publish local files as a package
    Publish {
        /// Package identifier (author/name)
        package: String,
        /// File to publish, optionally with an install target (PATH[:TARGET])
        #[arg(long = "file", required = true)]
        files: Vec<String>,
        /// Package version
        #[arg(long)]
        version: Option<String>,
        /// Package description
        #[arg(long)]
        description: Option<String>,
        /// Search tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Metadata entry as KEY=VALUE; VALUE is parsed as JSON when possible
        #[arg(long = "metadata")]
        metadata: Vec<String>,
        /// Developer key (default: HUB_DEV_KEY)
        #[arg(long)]
        dev_key: Option<String>,
    },
    /// Print the path of the bundled sample registry
    SamplePath,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut overrides = Overrides {
        config: cli.config,
        registry: cli.registry,
        ..Default::default()
    };

    match cli.command {
        Commands::List { query } => {
            let settings = config::load(overrides)?;
            commands::list::run(&settings, query.as_deref())
        }

        Commands::Show { package, json } => {
            let settings = config::load(overrides)?;
            commands::show::run(&settings, &package, json)
        }

        Commands::Install {
            package,
            dest,
            force,
        } => {
            overrides.destination = dest;
            let settings = config::load(overrides)?;
            commands::install::run(&settings, &package, force)
        }

        Commands::Publish {
            package,
            files,
            version,
            description,
            tags,
            metadata,
            dev_key,
        } => {
            overrides.dev_key = dev_key;
            let settings = config::load(overrides)?;
            commands::publish::run(
                &settings,
                &commands::publish::PublishArgs {
                    package,
                    files,
                    version,
                    description,
                    tags,
                    metadata,
                },
            )
        }

        Commands::SamplePath => {
            println!("{}", hub_registry::sample_registry().display());
            Ok(())
        }
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use config::Settings;

    fn sample_settings(destination: PathBuf) -> Settings {
        Settings {
            registry: hub_registry::sample_registry().display().to_string(),
            dev_key: None,
            destination,
        }
    }

    /// Full workflow against the bundled registry: list → show → install → reinstall.
    #[test]
    fn list_show_install_workflow() {
        let dir = tempfile::tempdir().unwrap();
        let settings = sample_settings(dir.path().join("out"));

        commands::list::run(&settings, None).unwrap();
        commands::show::run(&settings, "dspy-team/hello-agent", false).unwrap();
        commands::show::run(&settings, "hello-agent", true).unwrap();

        commands::install::run(&settings, "dspy-team/hello-agent", false).unwrap();
        let installed = dir.path().join("out/hello_agent.py");
        assert!(installed.is_file());

        std::fs::write(&installed, b"edited").unwrap();
        commands::install::run(&settings, "hello-agent", false).unwrap();
        assert_eq!(std::fs::read(&installed).unwrap(), b"edited");

        commands::install::run(&settings, "hello-agent", true).unwrap();
        assert_ne!(std::fs::read(&installed).unwrap(), b"edited");
    }

    #[test]
    fn unknown_package_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let settings = sample_settings(dir.path().to_path_buf());
        assert!(commands::install::run(&settings, "nobody/nothing", false).is_err());
    }

    #[test]
    fn publish_to_bundled_registry_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("agent.py");
        std::fs::write(&file, b"print('x')").unwrap();

        let mut settings = sample_settings(dir.path().to_path_buf());
        settings.dev_key = Some("key".to_string());
        let args = commands::publish::PublishArgs {
            package: "me/agent".to_string(),
            files: vec![file.display().to_string()],
            version: Some("0.1.0".to_string()),
            description: None,
            tags: Vec::new(),
            metadata: Vec::new(),
        };
        let err = commands::publish::run(&settings, &args).unwrap_err();
        assert!(format!("{err:#}").contains("read-only"));
    }

    #[test]
    fn cli_parses_publish_flags() {
        let cli = Cli::try_parse_from([
            "hub",
            "--registry",
            "https://example.com/index.json",
            "publish",
            "me/agent",
            "--file",
            "a.py:src/a.py",
            "--file",
            "b.json",
            "--tag",
            "demo",
            "--metadata",
            "lm=\"small\"",
        ])
        .unwrap();
        assert_eq!(cli.registry.as_deref(), Some("https://example.com/index.json"));
        match cli.command {
            Commands::Publish { files, tags, .. } => {
                assert_eq!(files, ["a.py:src/a.py", "b.json"]);
                assert_eq!(tags, ["demo"]);
            }
            _ => panic!("expected publish"),
        }
    }
}

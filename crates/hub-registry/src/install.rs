//! Install engine.
//!
//! Walks an [`InstallPlan`] in order, fetching, verifying and writing each
//! file. Installation is best-effort: a failing file is recorded and the next
//! one is attempted, and files already written are left in place. Existing
//! destinations are only replaced when `force` is set.

use std::fmt;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::error::{RegistryError, Result};
use crate::integrity;
use crate::manifest::PackageId;
use crate::resolver::{InstallPlan, PlannedFile};
use crate::transport::Transport;

/// Options for the install operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstallOptions {
    /// Overwrite files that already exist at their destination.
    pub force: bool,
}

/// Why a single file could not be installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Fetched bytes did not match the declared digest.
    Integrity { expected: String, actual: String },
    /// Declared digest was not a recognised hex digest.
    MalformedDigest { digest: String },
    /// Source could not be fetched.
    Transport(String),
    /// Destination could not be created or written.
    Filesystem(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Integrity { expected, actual } => {
                write!(f, "integrity mismatch (expected {expected}, got {actual})")
            }
            FailureReason::MalformedDigest { digest } => write!(f, "malformed digest '{digest}'"),
            FailureReason::Transport(detail) => write!(f, "fetch failed: {detail}"),
            FailureReason::Filesystem(detail) => write!(f, "write failed: {detail}"),
        }
    }
}

/// Outcome for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    Written,
    Skipped,
    Failed(FailureReason),
}

/// One line of an [`InstallReport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    /// Normalized target relative to the destination root.
    pub target: String,
    /// Absolute destination path.
    pub destination: PathBuf,
    /// What happened.
    pub status: FileStatus,
}

impl FileOutcome {
    /// Last segment of the target.
    pub fn file_name(&self) -> &str {
        self.target.rsplit('/').next().unwrap_or(&self.target)
    }
}

impl fmt::Display for FileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            FileStatus::Written => write!(f, "{}: written", self.target),
            FileStatus::Skipped => write!(f, "{}: skipped (exists)", self.target),
            FileStatus::Failed(reason) => write!(f, "{}: failed: {reason}", self.target),
        }
    }
}

/// Per-file results of one install call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// Installed package.
    pub package: PackageId,
    /// Installed version.
    pub version: String,
    /// Root the files were written under.
    pub destination_root: PathBuf,
    /// Outcomes in plan order.
    pub files: Vec<FileOutcome>,
}

impl InstallReport {
    /// Number of files written.
    pub fn written(&self) -> usize {
        self.count(|s| matches!(s, FileStatus::Written))
    }

    /// Number of files left untouched because they already existed.
    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, FileStatus::Skipped))
    }

    /// Number of files that failed.
    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, FileStatus::Failed(_)))
    }

    /// Status of the file whose target (or file name) is `name`.
    pub fn status_of(&self, name: &str) -> Option<&FileStatus> {
        self.files
            .iter()
            .find(|f| f.target == name)
            .or_else(|| self.files.iter().find(|f| f.file_name() == name))
            .map(|f| &f.status)
    }

    fn count(&self, pred: impl Fn(&FileStatus) -> bool) -> usize {
        self.files.iter().filter(|f| pred(&f.status)).count()
    }
}

impl fmt::Display for InstallReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} v{}: {} written, {} skipped, {} failed",
            self.package,
            self.version,
            self.written(),
            self.skipped(),
            self.failed()
        )
    }
}

/// Install every file of `plan`, fetching through `transport`.
///
/// Fails only when every file failed; otherwise the report carries the
/// per-file outcomes.
pub fn install(
    plan: &InstallPlan,
    transport: &dyn Transport,
    options: InstallOptions,
) -> Result<InstallReport> {
    info!(
        "installing {} v{} into {}",
        plan.package,
        plan.version,
        plan.destination_root.display()
    );

    let files: Vec<FileOutcome> = plan
        .files
        .iter()
        .map(|file| {
            let status = install_file(file, transport, options);
            if let FileStatus::Failed(reason) = &status {
                warn!("{}: {reason}", file.target);
            }
            FileOutcome {
                target: file.target.clone(),
                destination: file.destination.clone(),
                status,
            }
        })
        .collect();

    let report = InstallReport {
        package: plan.package.clone(),
        version: plan.version.clone(),
        destination_root: plan.destination_root.clone(),
        files,
    };

    if !report.files.is_empty() && report.failed() == report.files.len() {
        return Err(RegistryError::InstallFailed {
            package: plan.package.to_string(),
            failures: report.files,
        });
    }

    info!("{report}");
    Ok(report)
}

fn install_file(file: &PlannedFile, transport: &dyn Transport, options: InstallOptions) -> FileStatus {
    let bytes = match transport.fetch(&file.source) {
        Ok(bytes) => bytes,
        Err(e) => return FileStatus::Failed(FailureReason::Transport(e.to_string())),
    };

    match integrity::verify_declared(&file.target, &bytes, file.digest.as_deref()) {
        Ok(()) => {}
        Err(RegistryError::IntegrityFailure {
            expected, actual, ..
        }) => return FileStatus::Failed(FailureReason::Integrity { expected, actual }),
        Err(RegistryError::MalformedDigest { digest, .. }) => {
            return FileStatus::Failed(FailureReason::MalformedDigest { digest })
        }
        Err(e) => return FileStatus::Failed(FailureReason::Filesystem(e.to_string())),
    }

    if file.destination.exists() && !options.force {
        debug!("{} exists, skipping", file.destination.display());
        return FileStatus::Skipped;
    }

    if let Some(parent) = file.destination.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            return FileStatus::Failed(FailureReason::Filesystem(format!(
                "creating {}: {e}",
                parent.display()
            )));
        }
    }

    match std::fs::write(&file.destination, &bytes) {
        Ok(()) => {
            debug!("wrote {} ({} bytes)", file.destination.display(), bytes.len());
            FileStatus::Written
        }
        Err(e) => FileStatus::Failed(FailureReason::Filesystem(format!(
            "writing {}: {e}",
            file.destination.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use crate::integrity::ContentHash;
    use crate::manifest::RegistryIndex;
    use crate::resolver::resolve;
    use crate::transport::{Location, LocalTransport};

    const EMPTY_MD5: &str = "d41d8cd98f00b204e9800998ecf8427e";

    /// Lay out a registry with a single `team/hello` package.
    fn registry(dir: &Path, digest: Option<&str>, extra_file: bool) -> RegistryIndex {
        let pkg_dir = dir.join("pkg");
        std::fs::create_dir_all(&pkg_dir).unwrap();
        std::fs::write(pkg_dir.join("hello.py"), b"print('hello')\n").unwrap();
        std::fs::write(pkg_dir.join("util.py"), b"X = 1\n").unwrap();

        let mut files = vec![serde_json::json!({
            "source": "pkg/hello.py",
            "target": "app/hello.py",
        })];
        if let Some(digest) = digest {
            files[0]["sha256"] = digest.into();
        }
        if extra_file {
            files.push(serde_json::json!({"source": "pkg/util.py", "target": "app/util.py"}));
        }
        let manifest = serde_json::json!({
            "packages": [{
                "name": "hello",
                "author": "team",
                "version": "0.1.0",
                "description": "hello world",
                "files": files,
            }]
        });
        RegistryIndex::parse(manifest.to_string().as_bytes()).unwrap()
    }

    fn plan_for(index: &RegistryIndex, registry: &Path, out: &Path) -> InstallPlan {
        let entry = index.find("team", "hello").unwrap();
        resolve(entry, &Location::Local(registry.to_path_buf()), out).unwrap()
    }

    #[test]
    fn install_into_empty_destination() {
        let reg = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let index = registry(reg.path(), None, false);
        let plan = plan_for(&index, reg.path(), &out.path().join("out"));

        let report = install(&plan, &LocalTransport, InstallOptions::default()).unwrap();
        assert_eq!(report.status_of("hello.py"), Some(&FileStatus::Written));
        assert_eq!(report.written(), 1);
        assert_eq!(
            std::fs::read(out.path().join("out/app/hello.py")).unwrap(),
            b"print('hello')\n"
        );
    }

    #[test]
    fn rerun_without_force_skips_everything() {
        let reg = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let index = registry(reg.path(), None, true);
        let plan = plan_for(&index, reg.path(), out.path());

        install(&plan, &LocalTransport, InstallOptions::default()).unwrap();
        std::fs::write(out.path().join("app/hello.py"), b"local edit").unwrap();

        let report = install(&plan, &LocalTransport, InstallOptions::default()).unwrap();
        assert_eq!(report.skipped(), 2);
        assert_eq!(report.written(), 0);
        assert_eq!(
            std::fs::read(out.path().join("app/hello.py")).unwrap(),
            b"local edit"
        );
    }

    #[test]
    fn force_overwrites_and_is_idempotent() {
        let reg = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let index = registry(reg.path(), None, true);
        let plan = plan_for(&index, reg.path(), out.path());
        let force = InstallOptions { force: true };

        std::fs::create_dir_all(out.path().join("app")).unwrap();
        std::fs::write(out.path().join("app/hello.py"), b"stale").unwrap();

        install(&plan, &LocalTransport, force).unwrap();
        let first = std::fs::read(out.path().join("app/hello.py")).unwrap();
        let report = install(&plan, &LocalTransport, force).unwrap();
        let second = std::fs::read(out.path().join("app/hello.py")).unwrap();

        assert_eq!(report.written(), 2);
        assert_eq!(first, b"print('hello')\n");
        assert_eq!(first, second);
    }

    #[test]
    fn matching_digest_installs() {
        let reg = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let digest = ContentHash::compute(b"print('hello')\n");
        let upper = digest.as_str().to_uppercase();
        let index = registry(reg.path(), Some(upper.as_str()), false);
        let plan = plan_for(&index, reg.path(), out.path());

        let report = install(&plan, &LocalTransport, InstallOptions::default()).unwrap();
        assert_eq!(report.written(), 1);
    }

    #[test]
    fn tampered_file_is_not_written() {
        let reg = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let digest = ContentHash::compute(b"print('hello')\n");
        let index = registry(reg.path(), Some(digest.as_str()), true);

        let mut tampered = std::fs::read(reg.path().join("pkg/hello.py")).unwrap();
        tampered[0] ^= 0x20;
        std::fs::write(reg.path().join("pkg/hello.py"), &tampered).unwrap();

        let plan = plan_for(&index, reg.path(), out.path());
        let report = install(&plan, &LocalTransport, InstallOptions::default()).unwrap();

        assert!(matches!(
            report.status_of("app/hello.py"),
            Some(FileStatus::Failed(FailureReason::Integrity { .. }))
        ));
        assert_eq!(report.status_of("app/util.py"), Some(&FileStatus::Written));
        assert!(!out.path().join("app/hello.py").exists());
    }

    #[test]
    fn only_file_failing_integrity_fails_install() {
        let reg = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let index = registry(reg.path(), Some(EMPTY_MD5), false);
        let plan = plan_for(&index, reg.path(), out.path());

        let err = install(&plan, &LocalTransport, InstallOptions::default()).unwrap_err();
        match err {
            RegistryError::InstallFailed { package, failures } => {
                assert_eq!(package, "team/hello");
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].file_name(), "hello.py");
                assert!(matches!(
                    failures[0].status,
                    FileStatus::Failed(FailureReason::Integrity { .. })
                ));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!out.path().join("app/hello.py").exists());
    }

    #[test]
    fn missing_source_is_reported_per_file() {
        let reg = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let index = registry(reg.path(), None, true);
        std::fs::remove_file(reg.path().join("pkg/util.py")).unwrap();

        let plan = plan_for(&index, reg.path(), out.path());
        let report = install(&plan, &LocalTransport, InstallOptions::default()).unwrap();
        assert_eq!(report.written(), 1);
        assert!(matches!(
            report.status_of("util.py"),
            Some(FileStatus::Failed(FailureReason::Transport(_)))
        ));
        assert_eq!(report.to_string(), "team/hello v0.1.0: 1 written, 0 skipped, 1 failed");
    }
}

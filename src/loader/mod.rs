//! Module and package loading.
//!
//! Loading is delegated to the build tooling through the [`Loader`] trait.
//! Raw loader failures are turned into actionable errors by
//! [`classify_load_error`].
//!
//! # Available Loaders
//!
//! | Loader | Toolchain | Manifest |
//! |--------|-----------|----------|
//! | [`GoListLoader`] | `go list` | `go.mod` |

mod go;

pub use go::GoListLoader;

use crate::error::{LoadError, LoadStage, ScanError};
use crate::model::{Module, Package};
use async_trait::async_trait;
use std::path::Path;

/// Text the Go toolchain prints when a tool was built with a Go version
/// that cannot handle the module being loaded. Both parts must be present.
const VERSION_MISMATCH_SIGNATURE: [&str; 2] = [
    "This application uses version go",
    "It may fail to compile with the current version",
];

/// Build settings passed through to the loader.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Also load test packages.
    pub test: bool,
    /// Build tags for package loading.
    pub tags: Vec<String>,
    /// Extra environment for the build tooling.
    pub env: Vec<(String, String)>,
}

/// Loads the module and package graph of a project directory.
///
/// No results are cached between calls.
#[async_trait]
pub trait Loader: Send + Sync {
    /// File that marks `dir` as a project root, e.g. `go.mod`.
    fn manifest_file(&self) -> &'static str;

    /// Loads every module in the build list. The project's own module is
    /// included with no version.
    async fn load_modules(
        &self,
        dir: &Path,
        options: &LoadOptions,
    ) -> Result<Vec<Module>, LoadError>;

    /// Loads the packages matching `patterns` and all of their
    /// dependencies. Matched packages are flagged as top-level.
    async fn load_packages(
        &self,
        dir: &Path,
        options: &LoadOptions,
        patterns: &[String],
    ) -> Result<Vec<Package>, LoadError>;
}

/// Turns a raw loader failure into the most specific error available.
///
/// A missing manifest wins over everything else, then a toolchain version
/// mismatch, and otherwise the failure is reported against `stage`.
pub fn classify_load_error(
    err: LoadError,
    dir: &Path,
    manifest: &str,
    stage: LoadStage,
) -> ScanError {
    if !dir.join(manifest).is_file() {
        tracing::debug!(dir = %dir.display(), manifest, "manifest missing");
        return ScanError::MissingManifest {
            manifest: manifest.to_string(),
            dir: dir.to_path_buf(),
        };
    }

    let detail = err.to_string();
    if is_version_mismatch(&detail) {
        tracing::debug!(%stage, "toolchain version mismatch");
        return ScanError::VersionMismatch { detail };
    }

    ScanError::Load { stage, source: err }
}

fn is_version_mismatch(msg: &str) -> bool {
    VERSION_MISMATCH_SIGNATURE.iter().all(|s| msg.contains(s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const MISMATCH: &str = "go: downloading ...\nThis application uses version go1.21 of the \
                            source-processing packages but runs version go1.20 of go/types.\n\
                            It may fail to compile with the current version";

    fn command_error(stderr: &str) -> LoadError {
        LoadError::Command {
            command: "go list".to_string(),
            stderr: stderr.to_string(),
        }
    }

    fn module_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("go.mod"), "module example.com/app\n\ngo 1.21\n").unwrap();
        dir
    }

    #[test]
    fn test_missing_manifest_wins() {
        let dir = tempfile::tempdir().unwrap();
        let err = classify_load_error(
            command_error(MISMATCH),
            dir.path(),
            "go.mod",
            LoadStage::Packages,
        );

        assert!(matches!(
            err,
            ScanError::MissingManifest { ref manifest, .. } if manifest == "go.mod"
        ));
    }

    #[test]
    fn test_missing_manifest_nonexistent_dir() {
        let err = classify_load_error(
            command_error("no such directory"),
            Path::new("/definitely/not/here"),
            "go.mod",
            LoadStage::Modules,
        );
        assert!(matches!(err, ScanError::MissingManifest { .. }));
    }

    #[test]
    fn test_version_mismatch_with_manifest() {
        let dir = module_dir();
        let err = classify_load_error(
            command_error(MISMATCH),
            dir.path(),
            "go.mod",
            LoadStage::Packages,
        );

        match err {
            ScanError::VersionMismatch { detail } => assert!(detail.contains("go1.21")),
            other => panic!("expected VersionMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_partial_signature_is_generic() {
        let dir = module_dir();
        let err = classify_load_error(
            command_error("This application uses version go1.21"),
            dir.path(),
            "go.mod",
            LoadStage::Packages,
        );
        assert!(matches!(err, ScanError::Load { stage: LoadStage::Packages, .. }));
    }

    #[test]
    fn test_generic_failure_reports_stage() {
        let dir = module_dir();
        let err = classify_load_error(
            command_error("malformed module path"),
            dir.path(),
            "go.mod",
            LoadStage::Modules,
        );

        assert_eq!(err.to_string(), "loading modules: go list failed: malformed module path");
    }

    #[test]
    fn test_manifest_directory_is_not_a_manifest() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("go.mod")).unwrap();
        let err = classify_load_error(command_error("x"), dir.path(), "go.mod", LoadStage::Modules);

        assert!(matches!(err, ScanError::MissingManifest { .. }));
    }
}

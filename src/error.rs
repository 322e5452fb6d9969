//! Error types for loading and scanning.
//!
//! [`LoadError`] is the raw failure reported by a [`Loader`](crate::loader::Loader).
//! [`ScanError`] is what a scan surfaces to the caller: load failures are
//! classified into the most specific variant available before they get here.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Which loading step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStage {
    Modules,
    Packages,
}

impl LoadStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadStage::Modules => "modules",
            LoadStage::Packages => "packages",
        }
    }
}

impl fmt::Display for LoadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by the build tooling while loading modules or packages.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} failed: {stderr}")]
    Command { command: String, stderr: String },

    #[error("malformed output from {command}: {source}")]
    Decode {
        command: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("packages contain errors:\n{}", .0.join("\n"))]
    Packages(Vec<String>),
}

/// Everything that can end a scan.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error(
        "no {manifest} file found in {}\n\nvulnscan only works with Go modules. \
         Try navigating to your module directory.",
        .dir.display()
    )]
    MissingManifest { manifest: String, dir: PathBuf },

    #[error(
        "loading packages failed, possibly due to a mismatch between the Go version \
         used to build the analysis engine and the Go version on PATH. Consider \
         rebuilding it with the current Go version.\n\n{detail}"
    )]
    VersionMismatch { detail: String },

    #[error("loading {stage}: {source}")]
    Load {
        stage: LoadStage,
        #[source]
        source: LoadError,
    },

    #[error("decoding message stream: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("output handler: {0}")]
    Handler(anyhow::Error),

    #[error(transparent)]
    Analysis(anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ScanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_stage_display() {
        assert_eq!(LoadStage::Modules.to_string(), "modules");
        assert_eq!(LoadStage::Packages.to_string(), "packages");
    }

    #[test]
    fn test_load_error_wraps_stage() {
        let err = ScanError::Load {
            stage: LoadStage::Packages,
            source: LoadError::Command {
                command: "go list".to_string(),
                stderr: "exit status 1".to_string(),
            },
        };
        assert_eq!(err.to_string(), "loading packages: go list failed: exit status 1");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_packages_error_lists_each() {
        let err = LoadError::Packages(vec!["a: bad".to_string(), "b: worse".to_string()]);
        assert_eq!(err.to_string(), "packages contain errors:\na: bad\nb: worse");
    }

    #[test]
    fn test_missing_manifest_names_file() {
        let err = ScanError::MissingManifest {
            manifest: "go.mod".to_string(),
            dir: PathBuf::from("/src/app"),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("no go.mod file found in /src/app"));
    }

    #[test]
    fn test_version_mismatch_appends_detail() {
        let err = ScanError::VersionMismatch {
            detail: "raw loader text".to_string(),
        };
        assert!(err.to_string().ends_with("\n\nraw loader text"));
    }

    #[test]
    fn test_analysis_error_passes_through() {
        let err = ScanError::Analysis(anyhow::anyhow!("engine crashed"));
        assert_eq!(err.to_string(), "engine crashed");
    }
}

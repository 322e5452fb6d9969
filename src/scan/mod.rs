//! Scan orchestration.
//!
//! Source mode ([`run_source`]) loads the module and package graph of a
//! project directory, reports the scope of the scan, and hands the graph to
//! an [`Analyzer`](crate::analyzer::Analyzer).

mod source;

pub use source::{run_source, source_progress_message};

use crate::loader::LoadOptions;
use crate::model::ScanLevel;

/// Settings for one source-mode scan.
#[derive(Debug, Clone, Default)]
pub struct ScanConfig {
    /// Package patterns selecting the scan targets, e.g. `./...`.
    pub patterns: Vec<String>,
    pub scan_level: ScanLevel,
    pub test: bool,
    pub tags: Vec<String>,
    pub env: Vec<(String, String)>,
    pub go_version: Option<String>,
}

impl ScanConfig {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            test: self.test,
            tags: self.tags.clone(),
            env: self.env.clone(),
        }
    }
}

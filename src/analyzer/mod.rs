//! The vulnerability analysis engine seam.
//!
//! Detection itself happens outside this crate. An [`Analyzer`] receives the
//! loaded graph and reports OSV entries and findings through the same
//! [`Handler`] the orchestrator reports progress through.

mod command;

pub use command::CommandAnalyzer;

use crate::handler::Handler;
use crate::model::{Package, PackageGraph};
use crate::scan::ScanConfig;
use async_trait::async_trait;
use std::path::Path;

#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Analyzes `packages` (the scan targets) within `graph`, reporting
    /// results to `handler`. Errors are passed to the caller unchanged.
    async fn analyze(
        &self,
        handler: &mut dyn Handler,
        dir: &Path,
        packages: &[&Package],
        config: &ScanConfig,
        graph: &PackageGraph,
    ) -> anyhow::Result<()>;
}

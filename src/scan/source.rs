use super::ScanConfig;
use crate::analyzer::Analyzer;
use crate::error::{LoadStage, Result, ScanError};
use crate::handler::Handler;
use crate::loader::{classify_load_error, Loader};
use crate::model::{Package, PackageGraph, Progress};
use std::path::Path;

const NO_MATCHING_PACKAGES: &str = "No packages matching the provided pattern.";

/// Reports vulnerabilities affecting the packages under `dir` that match
/// `config.patterns`.
///
/// Sends exactly one progress message once the graph is loaded, then
/// delegates to `analyzer` unless no package matched. Nothing happens at
/// all when there are no patterns.
pub async fn run_source(
    handler: &mut dyn Handler,
    config: &ScanConfig,
    loader: &dyn Loader,
    analyzer: &dyn Analyzer,
    dir: &Path,
) -> Result<()> {
    if config.patterns.is_empty() {
        return Ok(());
    }

    let options = config.load_options();
    let manifest = loader.manifest_file();
    let mut graph = PackageGraph::new(config.go_version.clone());

    let modules = loader
        .load_modules(dir, &options)
        .await
        .map_err(|err| classify_load_error(err, dir, manifest, LoadStage::Modules))?;
    let module_count = modules.len();
    graph.insert_modules(modules);
    tracing::debug!(modules = module_count, "loaded modules");

    if config.scan_level.wants_packages() {
        let packages = loader
            .load_packages(dir, &options, &config.patterns)
            .await
            .map_err(|err| classify_load_error(err, dir, manifest, LoadStage::Packages))?;
        graph.insert_packages(packages);
        tracing::debug!(packages = graph.len(), "loaded packages");
    }

    let tops = graph.top_level();
    // the project's own module is not a dependency
    let progress = source_progress_message(&graph, &tops, module_count.saturating_sub(1));
    handler.progress(&progress).map_err(ScanError::Handler)?;

    if tops.is_empty() {
        return Ok(());
    }

    // stream errors raised while relaying the engine's output keep their kind
    analyzer
        .analyze(handler, dir, &tops, config, &graph)
        .await
        .map_err(|err| err.downcast::<ScanError>().unwrap_or_else(ScanError::Analysis))
}

/// Builds the progress message announcing the scope of a scan:
///
/// ```text
/// Scanning your code and P packages across M dependent modules for known vulnerabilities...
/// ```
///
/// where P counts the packages `tops` depend on, excluding `tops`
/// themselves. With no top-level packages the pattern matched nothing and
/// the message says so instead.
pub fn source_progress_message(
    graph: &PackageGraph,
    tops: &[&Package],
    modules: usize,
) -> Progress {
    if tops.is_empty() {
        return Progress::new(NO_MATCHING_PACKAGES);
    }
    Progress::new(scope_message(graph.dependency_count(tops), modules))
}

fn scope_message(packages: usize, modules: usize) -> String {
    format!(
        "Scanning your code and {} across {} for known vulnerabilities...",
        counted(packages, "package"),
        counted(modules, "dependent module")
    )
}

fn counted(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("{} {}", n, noun)
    } else {
        format!("{} {}s", n, noun)
    }
}

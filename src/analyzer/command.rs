use super::Analyzer;
use crate::handler::{handle_json, Handler};
use crate::model::{Package, PackageGraph};
use crate::scan::ScanConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};

/// Runs an external analysis engine that writes the JSON message stream to
/// stdout.
///
/// The engine is started in the scanned directory with the configured
/// arguments followed by the import paths of the scan targets. Its stdout
/// is dispatched to the handler as it is produced. Its stderr is collected
/// and becomes part of the error when the engine exits unsuccessfully.
///
/// Decode and handler errors from the stream stop the engine and are
/// returned as the [`ScanError`](crate::ScanError) the dispatcher produced.
pub struct CommandAnalyzer {
    program: String,
    args: Vec<String>,
}

impl CommandAnalyzer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn command_args(&self, packages: &[&Package]) -> Vec<String> {
        let mut args = self.args.clone();
        let mut seen = std::collections::HashSet::new();
        for package in packages {
            if seen.insert(package.path.as_str()) {
                args.push(package.path.clone());
            }
        }
        args
    }
}

#[async_trait]
impl Analyzer for CommandAnalyzer {
    async fn analyze(
        &self,
        handler: &mut dyn Handler,
        dir: &Path,
        packages: &[&Package],
        config: &ScanConfig,
        graph: &PackageGraph,
    ) -> Result<()> {
        let args = self.command_args(packages);
        tracing::info!(
            program = %self.program,
            targets = packages.len(),
            graph_packages = graph.len(),
            scan_level = %config.scan_level,
            "starting analysis engine"
        );

        let mut child = Command::new(&self.program)
            .args(&args)
            .current_dir(dir)
            .envs(config.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to execute {}", self.program))?;

        let stdout = child
            .stdout
            .take()
            .context("analysis engine stdout was not captured")?;
        let mut stderr = child
            .stderr
            .take()
            .context("analysis engine stderr was not captured")?;
        // drained concurrently so a chatty engine cannot block on a full pipe
        let stderr = tokio::task::spawn_blocking(move || {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).trim().to_string()
        });

        if let Err(err) = handle_json(stdout, handler) {
            tracing::debug!(error = %err, "stopping analysis engine");
            let _ = child.kill();
            let _ = child.wait();
            let _ = stderr.await;
            return Err(err.into());
        }

        let status = child.wait()?;
        let stderr = stderr.await.unwrap_or_default();
        if !status.success() {
            if stderr.is_empty() {
                anyhow::bail!("{} exited with {}", self.program, status);
            }
            anyhow::bail!("{} exited with {}: {}", self.program, status, stderr);
        }
        if !stderr.is_empty() {
            tracing::debug!(%stderr, "analysis engine stderr");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScanError;
    use crate::handler::tests::RecordingHandler;
    use std::time::{Duration, Instant};

    fn shell(script: &str) -> CommandAnalyzer {
        CommandAnalyzer::new("sh", vec!["-c".to_string(), script.to_string()])
    }

    async fn analyze(
        analyzer: &CommandAnalyzer,
        handler: &mut RecordingHandler,
    ) -> anyhow::Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let config = ScanConfig::default();
        analyzer
            .analyze(handler, dir.path(), &[], &config, &PackageGraph::default())
            .await
    }

    #[test]
    fn test_command_args_appends_distinct_paths() {
        let analyzer = CommandAnalyzer::new("govulncheck", vec!["-json".to_string()]);
        let app = Package::new("example.com/app").top_level();
        let app_test = Package::new("example.com/app")
            .with_id("example.com/app [example.com/app.test]")
            .top_level();
        let cmd = Package::new("example.com/app/cmd").top_level();

        assert_eq!(
            analyzer.command_args(&[&app, &app_test, &cmd]),
            vec!["-json", "example.com/app", "example.com/app/cmd"]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_streams_engine_stdout_into_handler() {
        let analyzer = shell(
            r#"printf '{"osv":{"id":"GO-2023-1571"}}\n{"finding":{"osv":"GO-2023-1571"}}\n'"#,
        );
        let mut handler = RecordingHandler::default();

        analyze(&analyzer, &mut handler).await.unwrap();

        assert_eq!(handler.calls, vec!["osv:GO-2023-1571", "finding:GO-2023-1571"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_engine_failure_carries_stderr() {
        let analyzer = shell("echo 'vulnerability database unreachable' >&2; exit 2");
        let mut handler = RecordingHandler::default();

        let err = analyze(&analyzer, &mut handler).await.unwrap_err();
        let msg = err.to_string();

        assert!(msg.starts_with("sh exited with"));
        assert!(msg.ends_with(": vulnerability database unreachable"));
        assert!(handler.calls.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_silent_engine_failure() {
        let mut handler = RecordingHandler::default();
        let err = analyze(&shell("exit 2"), &mut handler).await.unwrap_err();

        assert_eq!(err.to_string(), "sh exited with exit status: 2");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stderr_ignored_on_success() {
        let analyzer = shell(r#"echo 'warming cache' >&2; printf '{"osv":{"id":"GO-1"}}'"#);
        let mut handler = RecordingHandler::default();

        analyze(&analyzer, &mut handler).await.unwrap();

        assert_eq!(handler.calls, vec!["osv:GO-1"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_handler_error_stops_engine() {
        // the engine would keep running long after its output if not killed
        let analyzer = shell(
            r#"for i in 1 2 3 4 5; do printf '{"osv":{"id":"GO-%s"}}\n' "$i"; done; exec sleep 30"#,
        );
        let mut handler = RecordingHandler {
            fail_on: Some(2),
            ..RecordingHandler::default()
        };
        let started = Instant::now();

        let err = analyze(&analyzer, &mut handler).await.unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(20));
        assert_eq!(handler.calls, vec!["osv:GO-1", "osv:GO-2"]);
        assert!(matches!(err.downcast_ref::<ScanError>(), Some(ScanError::Handler(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_malformed_output_stops_engine() {
        let analyzer = shell(r#"printf '{"osv":{"id":"GO-1"}}\n{"finding":]\n'; exec sleep 30"#);
        let mut handler = RecordingHandler::default();
        let started = Instant::now();

        let err = analyze(&analyzer, &mut handler).await.unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(20));
        assert_eq!(handler.calls, vec!["osv:GO-1"]);
        assert!(matches!(err.downcast_ref::<ScanError>(), Some(ScanError::Decode(_))));
    }

    #[tokio::test]
    async fn test_missing_engine_binary() {
        let analyzer = CommandAnalyzer::new("vulnscan-no-such-engine", Vec::new());
        let mut handler = RecordingHandler::default();

        let err = analyze(&analyzer, &mut handler).await.unwrap_err();

        assert!(err.to_string().contains("vulnscan-no-such-engine"));
    }
}

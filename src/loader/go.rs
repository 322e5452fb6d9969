use super::{LoadOptions, Loader};
use crate::error::LoadError;
use crate::model::{Module, Package};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::process::Command;

/// Loads modules and packages by running `go list`.
pub struct GoListLoader {
    go: String,
}

impl GoListLoader {
    pub fn new() -> Self {
        Self::with_command("go")
    }

    /// Uses a specific `go` binary instead of the one on PATH.
    pub fn with_command(go: impl Into<String>) -> Self {
        Self { go: go.into() }
    }

    fn run(
        &self,
        dir: &Path,
        options: &LoadOptions,
        args: &[String],
    ) -> Result<Vec<u8>, LoadError> {
        let command = format!("{} {}", self.go, args.join(" "));
        tracing::debug!(dir = %dir.display(), %command, "running loader");

        let output = Command::new(&self.go)
            .args(args)
            .current_dir(dir)
            .envs(options.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .output()
            .map_err(|source| LoadError::Spawn {
                program: self.go.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(LoadError::Command {
                command,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output.stdout)
    }
}

impl Default for GoListLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GoModule {
    path: String,
    version: Option<String>,
    #[serde(default)]
    main: bool,
}

impl From<GoModule> for Module {
    fn from(m: GoModule) -> Self {
        Module {
            path: m.path,
            version: m.version,
            main: m.main,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GoPackage {
    import_path: String,
    #[serde(default)]
    imports: Vec<String>,
    #[serde(default)]
    dep_only: bool,
    module: Option<GoModule>,
    error: Option<GoPackageError>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GoPackageError {
    err: String,
}

fn module_args() -> Vec<String> {
    ["list", "-m", "-json", "all"].iter().map(|s| s.to_string()).collect()
}

fn package_args(options: &LoadOptions, patterns: &[String]) -> Vec<String> {
    let mut args: Vec<String> = ["list", "-e", "-json", "-deps"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    if options.test {
        args.push("-test".to_string());
    }
    if !options.tags.is_empty() {
        args.push(format!("-tags={}", options.tags.join(",")));
    }
    args.extend(patterns.iter().cloned());
    args
}

fn parse_modules(stdout: &[u8]) -> Result<Vec<Module>, serde_json::Error> {
    serde_json::Deserializer::from_slice(stdout)
        .into_iter::<GoModule>()
        .map(|m| m.map(Module::from))
        .collect()
}

fn parse_packages(stdout: &[u8], command: &str) -> Result<Vec<Package>, LoadError> {
    let raw: Vec<GoPackage> = serde_json::Deserializer::from_slice(stdout)
        .into_iter::<GoPackage>()
        .collect::<Result<_, _>>()
        .map_err(|source| LoadError::Decode {
            command: command.to_string(),
            source,
        })?;

    let errors: Vec<String> = raw
        .iter()
        .filter_map(|p| p.error.as_ref().map(|e| format!("{}: {}", p.import_path, e.err)))
        .collect();
    if !errors.is_empty() {
        return Err(LoadError::Packages(errors));
    }

    Ok(raw
        .into_iter()
        .map(|p| {
            // test variants are listed as "path [pkg.test]"
            let path = p
                .import_path
                .split_once(" [")
                .map(|(path, _)| path.to_string())
                .unwrap_or_else(|| p.import_path.clone());
            Package {
                id: p.import_path,
                path,
                imports: p.imports,
                module: p.module.map(Module::from),
                top_level: !p.dep_only,
            }
        })
        .collect())
}

#[async_trait]
impl Loader for GoListLoader {
    fn manifest_file(&self) -> &'static str {
        "go.mod"
    }

    async fn load_modules(
        &self,
        dir: &Path,
        options: &LoadOptions,
    ) -> Result<Vec<Module>, LoadError> {
        let args = module_args();
        let stdout = self.run(dir, options, &args)?;
        parse_modules(&stdout).map_err(|source| LoadError::Decode {
            command: format!("{} {}", self.go, args.join(" ")),
            source,
        })
    }

    async fn load_packages(
        &self,
        dir: &Path,
        options: &LoadOptions,
        patterns: &[String],
    ) -> Result<Vec<Package>, LoadError> {
        let args = package_args(options, patterns);
        let stdout = self.run(dir, options, &args)?;
        parse_packages(&stdout, &format!("{} {}", self.go, args.join(" ")))
    }
}

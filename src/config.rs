//! Configuration file handling.
//!
//! This module provides loading and saving of vulnscan configuration
//! from a TOML file.
//!
//! # Configuration Location
//!
//! The configuration file is stored at:
//! - Linux: `~/.config/vulnscan/config.toml`
//! - macOS: `~/Library/Application Support/vulnscan/config.toml`
//! - Windows: `%APPDATA%\vulnscan\config.toml`
//!
//! # Example Configuration
//!
//! ```toml
//! scan_level = "symbol"
//! go_command = "go"
//! tags = ["integration"]
//! test = false
//! default_format = "text"
//! log_level = "warn"
//!
//! [env]
//! GOFLAGS = "-mod=mod"
//!
//! [analyzer]
//! program = "govulncheck"
//! args = ["-json"]
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use crate::model::ScanLevel;

/// Application configuration.
///
/// Command-line flags take precedence over these values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How deep to analyze when no `--scan-level` flag is provided.
    ///
    /// Default: "symbol"
    pub scan_level: ScanLevel,

    /// The `go` binary used to load modules and packages.
    ///
    /// Default: "go" (from PATH)
    pub go_command: String,

    /// Build tags applied when loading packages.
    pub tags: Vec<String>,

    /// Whether test packages are loaded too.
    ///
    /// Default: false
    pub test: bool,

    /// Default output format when no `--format` flag is provided.
    ///
    /// Valid values: "text", "json"
    /// Default: "text"
    pub default_format: String,

    /// Log filter used when `RUST_LOG` is not set.
    ///
    /// Default: "warn"
    pub log_level: String,

    /// Extra environment variables for the build tooling.
    pub env: BTreeMap<String, String>,

    /// The external analysis engine.
    pub analyzer: AnalyzerConfig,
}

/// How to start the analysis engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Engine executable.
    pub program: String,

    /// Arguments passed before the package paths.
    pub args: Vec<String>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            program: "govulncheck".to_string(),
            args: vec!["-json".to_string()],
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scan_level: ScanLevel::Symbol,
            go_command: "go".to_string(),
            tags: Vec::new(),
            test: false,
            default_format: "text".to_string(),
            log_level: "warn".to_string(),
            env: BTreeMap::new(),
            analyzer: AnalyzerConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the config file.
    ///
    /// If the config file doesn't exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        Self::from_toml(&content)
    }

    /// Parses configuration from TOML text. Missing keys keep their
    /// defaults.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Saves the configuration to the config file.
    ///
    /// Creates the parent directory if it doesn't exist.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    /// Returns the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vulnscan")
            .join("config.toml")
    }

    /// Generates a string containing the default configuration.
    pub fn generate_default_config() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }

    /// Environment for the build tooling as key/value pairs.
    pub fn env_pairs(&self) -> Vec<(String, String)> {
        self.env
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

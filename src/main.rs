use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use vulnscan::{
    analyzer::CommandAnalyzer,
    compare::compare_non_std_vulns,
    config::Config,
    handler::{handle_json, Handler, JsonHandler, TextHandler},
    loader::GoListLoader,
    model::{self, ScanLevel},
    scan::{run_source, ScanConfig},
};

/// Exit codes for CI integration
mod exit_codes {
    pub const SUCCESS: u8 = 0;
    pub const ERROR: u8 = 1;
    pub const VULNS_FOUND: u8 = 3;
}

const PROTOCOL_VERSION: &str = "v1.0.0";

#[derive(Parser)]
#[command(name = "vulnscan")]
#[command(
    author,
    version,
    about = "Scan Go source code for known vulnerabilities"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the packages of a module for vulnerabilities
    Source {
        /// Package patterns to scan
        #[arg(default_value = "./...")]
        patterns: Vec<String>,

        /// Directory of the module to scan
        #[arg(short = 'C', long, default_value = ".")]
        dir: PathBuf,

        /// Comma-separated build tags
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,

        /// Also scan test packages
        #[arg(long)]
        test: bool,

        /// Analysis depth (module, package, symbol)
        #[arg(long)]
        scan_level: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, value_enum)]
        format: Option<Format>,
    },

    /// Render a recorded JSON result stream as text
    Render {
        /// Stream file; reads stdin when omitted
        file: Option<PathBuf>,
    },

    /// Check that a recorded stream reports exactly the given third-party packages
    Compare {
        /// Recorded JSON result stream
        file: PathBuf,

        /// Expected vulnerable packages
        packages: Vec<String>,
    },

    /// Show or create config file
    Config {
        /// Generate default config file
        #[arg(long)]
        init: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(exit_codes::ERROR)
        }
    }
}

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn run() -> Result<u8> {
    let cli = Cli::parse();
    let config = Config::load().unwrap_or_default();
    init_tracing(&config);

    match cli.command {
        Commands::Source {
            patterns,
            dir,
            tags,
            test,
            scan_level,
            format,
        } => {
            let scan_level = match scan_level {
                Some(level) => level.parse::<ScanLevel>().map_err(|e| anyhow::anyhow!(e))?,
                None => config.scan_level,
            };
            let format = match format {
                Some(format) => format,
                None => parse_format(&config.default_format)?,
            };
            let scan = ScanConfig {
                patterns,
                scan_level,
                test: test || config.test,
                tags: if tags.is_empty() { config.tags.clone() } else { tags },
                env: config.env_pairs(),
                go_version: None,
            };
            run_scan(&config, scan, dir, format).await
        }
        Commands::Render { file } => {
            let input: Box<dyn Read> = match file {
                Some(path) => Box::new(
                    File::open(&path)
                        .with_context(|| format!("Failed to open {}", path.display()))?,
                ),
                None => Box::new(io::stdin().lock()),
            };
            let mut handler = TextHandler::new(io::stdout());
            handle_json(input, &mut handler)?;
            handler.finish()?;
            Ok(exit_code(handler.vulnerability_count()))
        }
        Commands::Compare { file, packages } => {
            let input =
                File::open(&file).with_context(|| format!("Failed to open {}", file.display()))?;
            let want: BTreeSet<String> = packages.into_iter().collect();
            compare_non_std_vulns(input, &want)?;
            println!("Vulnerable packages match.");
            Ok(exit_codes::SUCCESS)
        }
        Commands::Config { init, path } => {
            handle_config(init, path)?;
            Ok(exit_codes::SUCCESS)
        }
    }
}

async fn run_scan(config: &Config, scan: ScanConfig, dir: PathBuf, format: Format) -> Result<u8> {
    let loader = GoListLoader::with_command(&config.go_command);
    let analyzer = CommandAnalyzer::new(&config.analyzer.program, config.analyzer.args.clone());
    let intro = model::Config {
        protocol_version: PROTOCOL_VERSION.to_string(),
        scanner_name: env!("CARGO_PKG_NAME").to_string(),
        scanner_version: env!("CARGO_PKG_VERSION").to_string(),
        scan_level: Some(scan.scan_level),
        ..model::Config::default()
    };

    match format {
        Format::Text => {
            let mut handler = TextHandler::new(io::stdout());
            handler.config(&intro)?;
            run_source(&mut handler, &scan, &loader, &analyzer, &dir).await?;
            handler.finish()?;
            Ok(exit_code(handler.vulnerability_count()))
        }
        Format::Json => {
            let mut handler = JsonHandler::new(io::stdout());
            handler.config(&intro)?;
            run_source(&mut handler, &scan, &loader, &analyzer, &dir).await?;
            Ok(exit_codes::SUCCESS)
        }
    }
}

fn exit_code(vulnerabilities: usize) -> u8 {
    if vulnerabilities > 0 {
        exit_codes::VULNS_FOUND
    } else {
        exit_codes::SUCCESS
    }
}

fn parse_format(s: &str) -> Result<Format> {
    match s.to_lowercase().as_str() {
        "text" => Ok(Format::Text),
        "json" => Ok(Format::Json),
        _ => Err(anyhow::anyhow!(
            "Unknown format: {}. Use 'text' or 'json'",
            s
        )),
    }
}

fn handle_config(init: bool, show_path: bool) -> Result<()> {
    let config_path = Config::config_path();

    if show_path {
        println!("{}", config_path.display());
        return Ok(());
    }

    if init {
        if config_path.exists() {
            println!("Config file already exists at: {}", config_path.display());
            return Ok(());
        }

        let config = Config::default();
        config.save()?;
        println!("Created config file at: {}", config_path.display());
        println!();
        println!("Default configuration:");
        println!("{}", Config::generate_default_config());
        return Ok(());
    }

    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        println!("Config file: {}", config_path.display());
        println!();
        println!("{}", content);
    } else {
        println!("No config file found.");
        println!("Run 'vulnscan config --init' to create one.");
        println!();
        println!("Config path: {}", config_path.display());
    }

    Ok(())
}

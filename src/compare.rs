//! Comparison of a recorded scan against an expected set of vulnerable
//! packages.
//!
//! Used to check scanner output for well-known projects in integration
//! runs: standard-library findings vary with the toolchain, so only
//! third-party packages are compared.

use crate::handler::{handle_json, Handler};
use crate::model::{Config, Finding, OsvEntry, Progress};
use anyhow::Result;
use std::collections::BTreeSet;
use std::io::Read;

/// Module path the analysis engine reports for standard-library frames.
const STDLIB_MODULE: &str = "stdlib";

#[derive(Default)]
struct VulnerablePackages {
    packages: BTreeSet<String>,
}

impl Handler for VulnerablePackages {
    fn config(&mut self, _config: &Config) -> Result<()> {
        Ok(())
    }

    fn progress(&mut self, _progress: &Progress) -> Result<()> {
        Ok(())
    }

    fn osv(&mut self, _entry: &OsvEntry) -> Result<()> {
        Ok(())
    }

    fn finding(&mut self, finding: &Finding) -> Result<()> {
        if let Some(frame) = finding.trace.first() {
            if frame.module != STDLIB_MODULE {
                if let Some(package) = &frame.package {
                    self.packages.insert(package.clone());
                }
            }
        }
        Ok(())
    }
}

/// Collects the non-standard-library packages that findings in the stream
/// point at.
pub fn vulnerable_packages<R: Read>(from: R) -> Result<BTreeSet<String>> {
    let mut collector = VulnerablePackages::default();
    handle_json(from, &mut collector)?;
    Ok(collector.packages)
}

/// Fails unless the non-standard-library vulnerable packages in the stream
/// are exactly `want`.
pub fn compare_non_std_vulns<R: Read>(from: R, want: &BTreeSet<String>) -> Result<()> {
    let got = vulnerable_packages(from)?;
    if &got == want {
        return Ok(());
    }

    let missing: Vec<&str> = want.difference(&got).map(String::as_str).collect();
    let unexpected: Vec<&str> = got.difference(want).map(String::as_str).collect();
    let mut msg = String::from("vulnerable packages mismatch");
    if !missing.is_empty() {
        msg.push_str(&format!("\n  missing: {}", missing.join(", ")));
    }
    if !unexpected.is_empty() {
        msg.push_str(&format!("\n  unexpected: {}", unexpected.join(", ")));
    }
    anyhow::bail!(msg)
}

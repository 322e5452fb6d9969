use super::Handler;
use crate::model::{Config, Finding, OsvEntry, Progress};
use chrono::{DateTime, NaiveDate};
use std::collections::{BTreeSet, HashMap};
use std::io::Write;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct FindingRow {
    #[tabled(rename = "OSV")]
    osv: String,
    #[tabled(rename = "Summary")]
    summary: String,
    #[tabled(rename = "Module")]
    module: String,
    #[tabled(rename = "Found In")]
    found_in: String,
    #[tabled(rename = "Fixed In")]
    fixed_in: String,
    #[tabled(rename = "Package")]
    package: String,
}

/// The part of a finding shown in the table.
#[derive(PartialEq, Eq, PartialOrd, Ord)]
struct Affected {
    osv: String,
    module: String,
    found_in: String,
    fixed_in: String,
    package: String,
}

impl Affected {
    fn from_finding(finding: &Finding) -> Self {
        let frame = finding.trace.first();
        let or_dash = |value: Option<&String>| value.cloned().unwrap_or_else(|| "-".to_string());
        Self {
            osv: finding.osv.clone(),
            module: or_dash(frame.map(|fr| &fr.module).filter(|m| !m.is_empty())),
            found_in: or_dash(frame.and_then(|fr| fr.version.as_ref())),
            fixed_in: or_dash(finding.fixed_version.as_ref()),
            package: or_dash(frame.and_then(|fr| fr.package.as_ref())),
        }
    }
}

/// Human-readable output.
///
/// Progress is written as it arrives. Findings are rendered as a table by
/// [`finish`](TextHandler::finish), so they have to be held until then:
/// each one is reduced to a single table row and repeats are dropped,
/// which keeps memory proportional to the number of distinct rows rather
/// than to the length of the stream. Use [`JsonHandler`](super::JsonHandler)
/// when nothing may be held back.
pub struct TextHandler<W> {
    out: W,
    summaries: HashMap<String, String>,
    affected: BTreeSet<Affected>,
}

impl<W: Write + Send> TextHandler<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            summaries: HashMap::new(),
            affected: BTreeSet::new(),
        }
    }

    /// Number of distinct vulnerabilities with at least one finding.
    pub fn vulnerability_count(&self) -> usize {
        let ids: BTreeSet<&str> = self.affected.iter().map(|a| a.osv.as_str()).collect();
        ids.len()
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Writes the findings summary.
    pub fn finish(&mut self) -> anyhow::Result<()> {
        writeln!(self.out)?;

        if self.affected.is_empty() {
            writeln!(self.out, "No vulnerabilities found.")?;
            return Ok(());
        }

        let rows: Vec<FindingRow> = self
            .affected
            .iter()
            .map(|a| FindingRow {
                osv: a.osv.clone(),
                summary: self
                    .summaries
                    .get(&a.osv)
                    .map(|s| truncate(s, 50))
                    .unwrap_or_else(|| "-".to_string()),
                module: a.module.clone(),
                found_in: a.found_in.clone(),
                fixed_in: a.fixed_in.clone(),
                package: a.package.clone(),
            })
            .collect();

        let table = Table::new(rows).with(Style::rounded()).to_string();
        writeln!(self.out, "{}", table)?;
        writeln!(self.out)?;

        let count = self.vulnerability_count();
        writeln!(
            self.out,
            "Your code is affected by {} vulnerabilit{}.",
            count,
            if count == 1 { "y" } else { "ies" }
        )?;
        Ok(())
    }
}

impl<W: Write + Send> Handler for TextHandler<W> {
    fn config(&mut self, config: &Config) -> anyhow::Result<()> {
        if config.scanner_name.is_empty() {
            return Ok(());
        }
        write!(self.out, "Using {}", config.scanner_name)?;
        if !config.scanner_version.is_empty() {
            write!(self.out, "@{}", config.scanner_version)?;
        }
        if !config.db.is_empty() {
            write!(self.out, " and {}", config.db)?;
            if let Some(modified) = &config.db_last_modified {
                write!(self.out, " (last modified {})", format_timestamp(modified))?;
            }
        }
        writeln!(self.out, ".")?;
        Ok(())
    }

    fn progress(&mut self, progress: &Progress) -> anyhow::Result<()> {
        writeln!(self.out, "{}", progress.message)?;
        Ok(())
    }

    fn osv(&mut self, entry: &OsvEntry) -> anyhow::Result<()> {
        if let Some(summary) = &entry.summary {
            self.summaries.insert(entry.id.clone(), summary.clone());
        }
        Ok(())
    }

    fn finding(&mut self, finding: &Finding) -> anyhow::Result<()> {
        self.affected.insert(Affected::from_finding(finding));
        Ok(())
    }
}

/// Formats an RFC 3339 timestamp or a bare date for display. Anything else
/// is shown as sent.
fn format_timestamp(raw: &str) -> String {
    if let Ok(time) = DateTime::parse_from_rfc3339(raw) {
        return time.naive_utc().format("%Y-%m-%d %H:%M:%S UTC").to_string();
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.format("%Y-%m-%d").to_string();
    }
    raw.to_string()
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}

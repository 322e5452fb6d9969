use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// One entry of the scan-result stream.
///
/// Well-formed producers populate exactly one field. On the wire each
/// message is a JSON object with a single key:
///
/// ```json
/// {"progress": {"message": "Scanning your code..."}}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Config>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub osv: Option<OsvEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finding: Option<Finding>,
}

impl Message {
    pub fn config(config: Config) -> Self {
        Self {
            config: Some(config),
            ..Self::default()
        }
    }

    pub fn progress(progress: Progress) -> Self {
        Self {
            progress: Some(progress),
            ..Self::default()
        }
    }

    pub fn osv(entry: OsvEntry) -> Self {
        Self {
            osv: Some(entry),
            ..Self::default()
        }
    }

    pub fn finding(finding: Finding) -> Self {
        Self {
            finding: Some(finding),
            ..Self::default()
        }
    }

    /// Number of populated fields. Anything other than 1 is a protocol
    /// violation.
    pub fn populated(&self) -> usize {
        [
            self.config.is_some(),
            self.progress.is_some(),
            self.osv.is_some(),
            self.finding.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count()
    }
}

/// Depth of analysis requested for a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanLevel {
    Module,
    Package,
    #[default]
    Symbol,
}

impl ScanLevel {
    /// Whether this level needs packages loaded, not just modules.
    pub fn wants_packages(self) -> bool {
        matches!(self, ScanLevel::Package | ScanLevel::Symbol)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScanLevel::Module => "module",
            ScanLevel::Package => "package",
            ScanLevel::Symbol => "symbol",
        }
    }
}

impl fmt::Display for ScanLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ScanLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "module" => Ok(ScanLevel::Module),
            "package" => Ok(ScanLevel::Package),
            "symbol" => Ok(ScanLevel::Symbol),
            _ => Err(format!(
                "Unknown scan level: {}. Use 'module', 'package', or 'symbol'",
                s
            )),
        }
    }
}

/// Introductory information about the scanner and its database.
///
/// Payload types keep keys they do not know in `extra`, so a message
/// relayed through this crate comes out with the same content it went in
/// with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub protocol_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub scanner_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub scanner_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub db: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_last_modified: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub go_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_level: Option<ScanLevel>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    #[serde(default)]
    pub message: String,
}

impl Progress {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A vulnerability report in OSV format.
///
/// Only the fields this crate displays are typed; everything else,
/// timestamps included, is kept as-is so entries are relayed unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsvEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A vulnerability that affects the scanned code at some level.
///
/// `trace` starts at the vulnerable symbol, package, or module and, for
/// symbol-level findings, continues up the call stack into user code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    #[serde(default)]
    pub osv: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_version: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<Frame>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub module: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub filename: String,
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub column: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_finding() -> Finding {
        Finding {
            osv: "GO-2023-1571".to_string(),
            fixed_version: Some("v0.7.0".to_string()),
            trace: vec![Frame {
                module: "golang.org/x/net".to_string(),
                version: Some("v0.6.0".to_string()),
                package: Some("golang.org/x/net/http2/hpack".to_string()),
                function: Some("Decoder.Write".to_string()),
                ..Frame::default()
            }],
            ..Finding::default()
        }
    }

    #[test]
    fn test_finding_only_message_decodes_to_finding_only() {
        let original = Message::finding(sample_finding());
        let json = serde_json::to_string(&original).unwrap();
        let decoded: Message = serde_json::from_str(&json).unwrap();

        assert_eq!(decoded.populated(), 1);
        assert!(decoded.config.is_none());
        assert!(decoded.progress.is_none());
        assert!(decoded.osv.is_none());
        assert_eq!(decoded.finding, Some(sample_finding()));
    }

    #[test]
    fn test_absent_fields_not_encoded() {
        let json = serde_json::to_string(&Message::progress(Progress::new("hi"))).unwrap();
        assert_eq!(json, r#"{"progress":{"message":"hi"}}"#);
    }

    #[test]
    fn test_osv_entry_keeps_unknown_fields() {
        let json = r#"{
            "id": "GO-2022-0969",
            "modified": "2023-04-03T15:57:51Z",
            "aliases": ["CVE-2022-27664"],
            "affected": [{"package": {"name": "stdlib", "ecosystem": "Go"}}]
        }"#;
        let entry: OsvEntry = serde_json::from_str(json).unwrap();

        assert_eq!(entry.id, "GO-2022-0969");
        assert_eq!(entry.aliases, vec!["CVE-2022-27664"]);
        assert!(entry.extra.contains_key("affected"));

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["affected"][0]["package"]["name"], "stdlib");
    }

    #[test]
    fn test_unknown_top_level_keys_ignored() {
        let msg: Message =
            serde_json::from_str(r#"{"progress":{"message":"x"},"sbom":{}}"#).unwrap();
        assert_eq!(msg.populated(), 1);
    }

    #[test]
    fn test_scan_level_wants_packages() {
        assert!(!ScanLevel::Module.wants_packages());
        assert!(ScanLevel::Package.wants_packages());
        assert!(ScanLevel::Symbol.wants_packages());
        assert_eq!(ScanLevel::default(), ScanLevel::Symbol);
    }

    #[test]
    fn test_scan_level_parse() {
        assert_eq!("Module".parse::<ScanLevel>(), Ok(ScanLevel::Module));
        assert_eq!("symbol".parse::<ScanLevel>(), Ok(ScanLevel::Symbol));
        assert!("deep".parse::<ScanLevel>().is_err());
    }

    #[test]
    fn test_config_keeps_timestamp_text() {
        let json = r#"{"config":{"protocol_version":"v1.0.0",
            "db_last_modified":"2023-09-01T12:00:00Z","scan_level":"package"}}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        let config = msg.config.unwrap();

        assert_eq!(config.scan_level, Some(ScanLevel::Package));
        assert_eq!(config.db_last_modified.as_deref(), Some("2023-09-01T12:00:00Z"));
    }

    #[test]
    fn test_date_only_modified_accepted() {
        let msg: Message =
            serde_json::from_str(r#"{"osv":{"id":"GO-1","modified":"2023-04-03"}}"#).unwrap();
        let entry = msg.osv.unwrap();

        assert_eq!(entry.id, "GO-1");
        assert_eq!(entry.extra["modified"], "2023-04-03");
    }

    #[test]
    fn test_payloads_without_identifiers_decode() {
        let msg: Message = serde_json::from_str(r#"{"finding":{"trace":[{}]}}"#).unwrap();
        let finding = msg.finding.unwrap();

        assert!(finding.osv.is_empty());
        assert_eq!(finding.trace, vec![Frame::default()]);
    }

    #[test]
    fn test_finding_keeps_unknown_fields_at_every_level() {
        let json = r#"{
            "osv": "GO-2023-1571",
            "scan_mode": "source",
            "trace": [{
                "module": "golang.org/x/net",
                "inline": true,
                "position": {"filename": "hpack.go", "offset": 10, "line": 2, "column": 3, "dir": "/x"}
            }]
        }"#;
        let finding: Finding = serde_json::from_str(json).unwrap();

        assert_eq!(finding.extra["scan_mode"], "source");
        assert_eq!(finding.trace[0].extra["inline"], true);
        let position = finding.trace[0].position.as_ref().unwrap();
        assert_eq!(position.extra["dir"], "/x");

        let value = serde_json::to_value(&finding).unwrap();
        let original: Value = serde_json::from_str(json).unwrap();
        assert_eq!(value, original);
    }
}

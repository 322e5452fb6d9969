//! Consumers of the scan-result stream.
//!
//! A [`Handler`] receives each decoded [`Message`] of a scan. The same
//! handler is shared by the source orchestrator, which reports progress
//! through it, and by the analysis engine, which reports OSV entries and
//! findings through it.
//!
//! [`handle_json`] reads a stream of JSON messages incrementally and drives
//! a handler with them.
//!
//! # Example
//!
//! ```
//! use vulnscan::handler::{handle_json, TextHandler};
//!
//! let stream = r#"{"progress":{"message":"Scanning..."}}"#;
//! let mut handler = TextHandler::new(Vec::new());
//! handle_json(stream.as_bytes(), &mut handler).unwrap();
//! ```

mod json;
mod text;

pub use json::JsonHandler;
pub use text::TextHandler;

use crate::error::{Result, ScanError};
use crate::model::{Config, Finding, Message, OsvEntry, Progress};
use std::io::{BufReader, Read};

/// Receives the messages of a scan, in stream order.
///
/// Returning an error from any method aborts the scan that is feeding the
/// handler.
pub trait Handler: Send {
    /// Introductory information about the scanner.
    fn config(&mut self, config: &Config) -> anyhow::Result<()>;

    /// A human-readable status update.
    fn progress(&mut self, progress: &Progress) -> anyhow::Result<()>;

    /// An OSV entry referenced by later findings.
    fn osv(&mut self, entry: &OsvEntry) -> anyhow::Result<()>;

    /// A vulnerability finding.
    fn finding(&mut self, finding: &Finding) -> anyhow::Result<()>;
}

impl<H: Handler + ?Sized> Handler for &mut H {
    fn config(&mut self, config: &Config) -> anyhow::Result<()> {
        (**self).config(config)
    }

    fn progress(&mut self, progress: &Progress) -> anyhow::Result<()> {
        (**self).progress(progress)
    }

    fn osv(&mut self, entry: &OsvEntry) -> anyhow::Result<()> {
        (**self).osv(entry)
    }

    fn finding(&mut self, finding: &Finding) -> anyhow::Result<()> {
        (**self).finding(finding)
    }
}

/// Reads JSON messages from `from` and hands each one to `to`.
///
/// Messages are decoded one at a time, so the stream may be arbitrarily
/// long. The first decode error or handler error stops reading and is
/// returned.
pub fn handle_json<R, H>(from: R, to: &mut H) -> Result<()>
where
    R: Read,
    H: Handler + ?Sized,
{
    let stream = serde_json::Deserializer::from_reader(BufReader::new(from)).into_iter::<Message>();
    for message in stream {
        dispatch(message?, to)?;
    }
    Ok(())
}

/// Hands a single message to the handler method for its populated field.
///
/// Exactly one method is called. If a malformed message has several fields
/// set, the first in config, progress, osv, finding order wins. A message
/// with no field set is skipped.
pub fn dispatch<H>(message: Message, to: &mut H) -> Result<()>
where
    H: Handler + ?Sized,
{
    if message.populated() > 1 {
        tracing::warn!(
            fields = message.populated(),
            "message has more than one field set; dispatching the first"
        );
    }

    let result = if let Some(config) = &message.config {
        to.config(config)
    } else if let Some(progress) = &message.progress {
        to.progress(progress)
    } else if let Some(entry) = &message.osv {
        to.osv(entry)
    } else if let Some(finding) = &message.finding {
        to.finding(finding)
    } else {
        tracing::warn!("skipping message with no field set");
        Ok(())
    };

    result.map_err(ScanError::Handler)
}

use super::Handler;
use crate::model::{Config, Finding, Message, OsvEntry, Progress};
use std::io::Write;

/// Writes every message back out in the stream wire format.
///
/// Each message is one indented JSON object followed by a newline, and the
/// writer is flushed after every message so a reader on the other end of a
/// pipe sees results as they are produced.
pub struct JsonHandler<W> {
    out: W,
}

impl<W: Write + Send> JsonHandler<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write(&mut self, message: &Message) -> anyhow::Result<()> {
        serde_json::to_writer_pretty(&mut self.out, message)?;
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }
}

impl<W: Write + Send> Handler for JsonHandler<W> {
    fn config(&mut self, config: &Config) -> anyhow::Result<()> {
        self.write(&Message::config(config.clone()))
    }

    fn progress(&mut self, progress: &Progress) -> anyhow::Result<()> {
        self.write(&Message::progress(progress.clone()))
    }

    fn osv(&mut self, entry: &OsvEntry) -> anyhow::Result<()> {
        self.write(&Message::osv(entry.clone()))
    }

    fn finding(&mut self, finding: &Finding) -> anyhow::Result<()> {
        self.write(&Message::finding(finding.clone()))
    }
}

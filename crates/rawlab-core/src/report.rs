//! Machine-readable batch reports in JSON or JSON Lines.

use serde::Serialize;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::batch::{BatchSummary, JobResult};
use crate::error::Result;

/// Report layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    /// One pretty-printed object with the summary and every result
    Json,
    /// One result per line followed by a summary line
    JsonLines,
}

impl ReportFormat {
    /// Parse format from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "jsonl" | "jsonlines" | "ndjson" => Some(Self::JsonLines),
            _ => None,
        }
    }

    /// Pick the format from a report file's extension, defaulting to JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()).and_then(Self::parse) {
            Some(Self::JsonLines) => Self::JsonLines,
            _ => Self::Json,
        }
    }
}

#[derive(Serialize)]
struct BatchReport<'a> {
    total: usize,
    succeeded: usize,
    skipped: usize,
    failed: usize,
    cancelled: usize,
    elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    results: Option<&'a [JobResult]>,
}

impl<'a> BatchReport<'a> {
    fn new(summary: &'a BatchSummary, with_results: bool) -> Self {
        Self {
            total: summary.total,
            succeeded: summary.succeeded,
            skipped: summary.skipped,
            failed: summary.failed,
            cancelled: summary.cancelled,
            elapsed_ms: summary.elapsed.as_millis() as u64,
            results: with_results.then_some(summary.results.as_slice()),
        }
    }
}

#[derive(Serialize)]
struct SummaryLine<'a> {
    summary: BatchReport<'a>,
}

/// Serializes a [`BatchSummary`] to any writer.
pub struct ReportWriter<W: Write> {
    writer: W,
    format: ReportFormat,
    records_written: usize,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(writer: W, format: ReportFormat) -> Self {
        Self {
            writer,
            format,
            records_written: 0,
        }
    }

    pub fn write_summary(&mut self, summary: &BatchSummary) -> io::Result<()> {
        match self.format {
            ReportFormat::Json => {
                serde_json::to_writer_pretty(&mut self.writer, &BatchReport::new(summary, true))
                    .map_err(io::Error::other)?;
                writeln!(self.writer)?;
                self.records_written += 1;
            }
            ReportFormat::JsonLines => {
                for result in &summary.results {
                    serde_json::to_writer(&mut self.writer, result).map_err(io::Error::other)?;
                    writeln!(self.writer)?;
                    self.records_written += 1;
                }
                let line = SummaryLine {
                    summary: BatchReport::new(summary, false),
                };
                serde_json::to_writer(&mut self.writer, &line).map_err(io::Error::other)?;
                writeln!(self.writer)?;
                self.records_written += 1;
            }
        }
        self.writer.flush()
    }

    /// Number of JSON records written so far.
    pub fn records_written(&self) -> usize {
        self.records_written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Write a report file, choosing the format from its extension.
pub fn write_report_file(path: &Path, summary: &BatchSummary) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let format = ReportFormat::from_path(path);
    let file = std::fs::File::create(path)?;
    let mut writer = ReportWriter::new(BufWriter::new(file), format);
    writer.write_summary(summary)?;
    tracing::info!("Wrote {:?} report to {:?}", format, path);
    Ok(())
}

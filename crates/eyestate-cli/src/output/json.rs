//! JSON output adapter.

use anyhow::Result;
use eyestate_core::domain::ResultBatch;
use serde::Serialize;
use std::io::{self, Write};
use std::sync::Mutex;
use tracing::debug;

/// One scored eye pair.
#[derive(Debug, Clone, Serialize)]
pub struct EntryReport {
    /// Position in the batch.
    pub index: usize,
    /// Aggregate (right + left) class scores.
    pub scores: Vec<f32>,
    /// Label of the highest score, if labels are known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Milliseconds since the batch started.
    pub elapsed_ms: u64,
}

/// A verified batch as written to stdout.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    /// Where the eyes came from: a bundle directory or a source image.
    pub source: String,
    /// RFC 3339 UTC time the report was produced.
    pub timestamp: String,
    /// Total verification time in hundredths of a second.
    pub verification_time: u64,
    /// Scored pairs in capture order.
    pub entries: Vec<EntryReport>,
}

impl BatchReport {
    /// Builds a report, naming each entry by its highest-scoring label.
    #[must_use]
    pub fn new(source: impl Into<String>, batch: &ResultBatch, labels: &[String]) -> Self {
        let entries = batch
            .entries()
            .iter()
            .enumerate()
            .map(|(index, entry)| EntryReport {
                index,
                scores: entry.scores.as_slice().to_vec(),
                label: entry
                    .scores
                    .argmax()
                    .and_then(|i| labels.get(i))
                    .cloned(),
                elapsed_ms: u64::try_from(entry.elapsed.as_millis()).unwrap_or(u64::MAX),
            })
            .collect();

        Self {
            source: source.into(),
            timestamp: iso_timestamp(),
            verification_time: batch.verification_time(),
            entries,
        }
    }
}

/// A single entry line in JSON Lines output.
#[derive(Serialize)]
struct EntryLine<'a> {
    source: &'a str,
    timestamp: &'a str,
    #[serde(flatten)]
    entry: &'a EntryReport,
}

/// JSON / JSON Lines output adapter.
pub struct JsonOutput {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl JsonOutput {
    /// Creates a new JSON output writing to stdout.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    /// Creates a new JSON output writing to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Writes any serializable value as one JSON document.
    pub fn write_value<T: Serialize>(&self, value: &T, pretty: bool) -> Result<()> {
        let json = if pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        self.write_line(&json)
    }

    /// Writes a report as one JSON Lines record per entry.
    pub fn write_lines(&self, report: &BatchReport) -> Result<()> {
        for entry in &report.entries {
            let line = serde_json::to_string(&EntryLine {
                source: &report.source,
                timestamp: &report.timestamp,
                entry,
            })?;
            self.write_line(&line)?;
        }
        Ok(())
    }

    #[allow(clippy::significant_drop_tightening)]
    fn write_line(&self, line: &str) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock poisoned: {e}"))?;
        writeln!(writer, "{line}")?;
        writer.flush()?;
        Ok(())
    }
}

/// Generate ISO 8601 UTC timestamp (RFC 3339 format).
fn iso_timestamp() -> String {
    match time::OffsetDateTime::now_utc().format(&time::format_description::well_known::Rfc3339) {
        Ok(ts) => ts,
        Err(e) => {
            debug!("Timestamp format failed: {e}");
            String::from("1970-01-01T00:00:00Z")
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use eyestate_core::domain::{EyeBitmap, InferenceResult, ScoreVector};
    use image::RgbaImage;
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn batch() -> ResultBatch {
        let eye = EyeBitmap::new(RgbaImage::new(2, 2));
        let entries = (0..2u64)
            .map(|i| InferenceResult {
                scores: ScoreVector::new(vec![0.1, 0.9]),
                left: eye.clone(),
                right: eye.clone(),
                elapsed: Duration::from_millis(10 * (i + 1)),
            })
            .collect();
        ResultBatch::new(entries, Duration::from_millis(250))
    }

    #[test]
    fn test_report_labels_and_time() {
        let labels = vec!["closed".to_string(), "open".to_string()];
        let report = BatchReport::new("dir", &batch(), &labels);
        assert_eq!(report.verification_time, 25);
        assert_eq!(report.entries[0].label.as_deref(), Some("open"));
        assert_eq!(report.entries[1].elapsed_ms, 20);

        let unlabeled = BatchReport::new("dir", &batch(), &[]);
        assert!(unlabeled.entries[0].label.is_none());
    }

    #[test]
    fn test_jsonl_one_line_per_entry() {
        let sink = Shared::default();
        let output = JsonOutput::new(Box::new(sink.clone()));
        output
            .write_lines(&BatchReport::new("eyes", &batch(), &[]))
            .unwrap();

        let text = String::from_utf8(sink.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["source"], "eyes");
        assert_eq!(first["index"], 0);
        assert!(first.get("label").is_none());
    }
}

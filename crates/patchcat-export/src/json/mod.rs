//! JSON comparison report
//!
//! Carries the archive labels, per-status counts, the dispatcher outcome
//! and the classification records.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use patchcat_compare::ComparisonReport;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

/// JSON export errors
#[derive(Error, Debug)]
pub enum JsonError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type JsonResult<T> = Result<T, JsonError>;

/// JSON export options
#[derive(Debug, Clone)]
pub struct JsonExportOptions {
    /// Use pretty-print formatting
    pub pretty: bool,

    /// Include summary counts and run statistics
    pub include_metadata: bool,
}

impl Default for JsonExportOptions {
    fn default() -> Self {
        Self {
            pretty: true,
            include_metadata: true,
        }
    }
}

/// JSON report exporter
pub struct JsonExporter {
    options: JsonExportOptions,
}

impl JsonExporter {
    /// Create new exporter with default options
    pub fn new() -> Self {
        Self {
            options: JsonExportOptions::default(),
        }
    }

    /// Create exporter with custom options
    pub fn with_options(options: JsonExportOptions) -> Self {
        Self { options }
    }

    /// Build the JSON document for a report
    pub fn to_value(&self, report: &ComparisonReport) -> serde_json::Value {
        let records: Vec<_> = report
            .manifest
            .sorted()
            .into_iter()
            .map(|r| {
                json!({
                    "status": r.status.code().to_string(),
                    "path": r.path,
                })
            })
            .collect();

        if !self.options.include_metadata {
            return json!(records);
        }

        let summary: serde_json::Map<String, serde_json::Value> = report
            .manifest
            .counts()
            .into_iter()
            .map(|(status, count)| (status.to_string(), json!(count)))
            .collect();

        json!({
            "latest": report.latest,
            "previous": report.previous,
            "summary": summary,
            "stats": report.stats,
            "outcome": report.outcome,
            "warnings": report.warning_count(),
            "elapsed_ms": report.elapsed.as_millis() as u64,
            "records": records,
        })
    }

    /// Render the report into a string
    pub fn render(&self, report: &ComparisonReport) -> JsonResult<String> {
        let value = self.to_value(report);
        let text = if self.options.pretty {
            serde_json::to_string_pretty(&value)?
        } else {
            serde_json::to_string(&value)?
        };
        Ok(text)
    }

    /// Write the report to a file
    pub fn export(&self, report: &ComparisonReport, output_path: impl AsRef<Path>) -> JsonResult<()> {
        let output_path = output_path.as_ref();
        let value = self.to_value(report);

        let file = File::create(output_path)?;
        let mut writer = BufWriter::new(file);
        if self.options.pretty {
            serde_json::to_writer_pretty(&mut writer, &value)?;
        } else {
            serde_json::to_writer(&mut writer, &value)?;
        }
        writer.flush()?;

        debug!(path = %output_path.display(), "Wrote JSON report");
        Ok(())
    }
}

impl Default for JsonExporter {
    fn default() -> Self {
        Self::new()
    }
}

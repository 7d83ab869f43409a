//! patchcat export pipeline
//!
//! Renders comparison results for consumers:
//! - CSV change catalogue (`Status,FileName`)
//! - JSON report (summary, outcome, records)

pub mod csv;
pub mod json;

pub use csv::{CsvError, CsvExportOptions, CsvExporter};
pub use json::{JsonError, JsonExportOptions, JsonExporter};

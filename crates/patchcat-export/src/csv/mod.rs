//! CSV change catalogue
//!
//! Layout:
//! ```text
//! Status,FileName
//! A,conf/new.xml
//! M,lib/app.jar
//! D,bin/old.sh
//! ```
//! Records follow the header one per line, without a trailing newline.
//! Paths containing a comma, a double quote or a line break are quoted.

use std::borrow::Cow;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use patchcat_core::{ClassificationRecord, Manifest};
use thiserror::Error;
use tracing::debug;

/// CSV export errors
#[derive(Error, Debug)]
pub enum CsvError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CsvResult<T> = Result<T, CsvError>;

/// CSV export options
#[derive(Debug, Clone)]
pub struct CsvExportOptions {
    /// Order records by path instead of completion order
    pub sorted: bool,
}

impl Default for CsvExportOptions {
    fn default() -> Self {
        Self {
            sorted: true,
        }
    }
}

/// Writes a [`Manifest`] as a change catalogue
pub struct CsvExporter {
    options: CsvExportOptions,
}

impl CsvExporter {
    /// Create new exporter with default options
    pub fn new() -> Self {
        Self {
            options: CsvExportOptions::default(),
        }
    }

    /// Create exporter with custom options
    pub fn with_options(options: CsvExportOptions) -> Self {
        Self { options }
    }

    /// Render the catalogue into a string
    pub fn render(&self, manifest: &Manifest) -> String {
        let mut out = Vec::new();
        // Writing into a Vec cannot fail
        let _ = self.write_to(manifest, &mut out);
        String::from_utf8_lossy(&out).into_owned()
    }

    /// Write the catalogue to any writer
    pub fn write_to<W: Write>(&self, manifest: &Manifest, mut writer: W) -> CsvResult<()> {
        writer.write_all(manifest.header().as_bytes())?;

        for record in self.ordered(manifest) {
            write!(
                writer,
                "\n{},{}",
                record.status.code(),
                quote_field(&record.path)
            )?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Write the catalogue to a file, replacing any existing one
    pub fn export(&self, manifest: &Manifest, output_path: impl AsRef<Path>) -> CsvResult<()> {
        let output_path = output_path.as_ref();
        let file = File::create(output_path)?;
        self.write_to(manifest, BufWriter::new(file))?;

        debug!(path = %output_path.display(), records = manifest.len(), "Wrote CSV catalogue");
        Ok(())
    }

    fn ordered<'a>(&self, manifest: &'a Manifest) -> Vec<&'a ClassificationRecord> {
        if self.options.sorted {
            manifest.sorted()
        } else {
            manifest.iter().collect()
        }
    }
}

impl Default for CsvExporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Quote a field per RFC 4180 when it needs it
fn quote_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

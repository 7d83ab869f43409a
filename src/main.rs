//! patchcat CLI
//!
//! Compares the latest release archive against the previous one and writes
//! a change catalogue listing every added, modified and deleted file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use patchcat_compare::{compare_archives, CompareOptions, ComparisonReport, DrainOutcome};
use patchcat_core::logging::{self, TracingConfig};
use patchcat_core::{ChangeStatus, Error};
use patchcat_export::{CsvExporter, JsonExporter};

/// patchcat - build a patch catalogue from two release archives
#[derive(Parser)]
#[command(name = "patchcat")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Archive of the latest build
    latest: PathBuf,

    /// Archive of the previous build
    previous: PathBuf,

    /// Catalogue file to write (replaced if it exists)
    #[arg(short, long, default_value = "catalogue.csv")]
    output: PathBuf,

    /// Catalogue format: csv or json
    #[arg(long, default_value = "csv")]
    format: OutputFormat,

    /// Number of compare workers
    #[arg(short, long, default_value_t = patchcat_compare::options::DEFAULT_WORKERS)]
    workers: usize,

    /// Seconds to wait for outstanding compares before writing a partial catalogue
    #[arg(long, default_value_t = 600)]
    timeout: u64,

    /// Read buffer size in bytes used while hashing entries
    #[arg(long, default_value_t = patchcat_compare::DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Record entries that could not be read as `I` instead of skipping them
    #[arg(long)]
    strict: bool,

    /// Enable verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum OutputFormat {
    #[default]
    Csv,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_with_config(TracingConfig::for_verbosity(cli.verbose));

    let options = CompareOptions {
        workers: cli.workers,
        drain_timeout: Duration::from_secs(cli.timeout),
        chunk_size: cli.chunk_size,
        strict: cli.strict,
    };
    options.validate().context("Invalid options")?;

    if cli.output.exists() {
        fs::remove_file(&cli.output)
            .with_context(|| format!("Failed to remove previous catalogue {:?}", cli.output))?;
        info!("Removed previous catalogue: {:?}", cli.output);
    }

    let report = compare_archives(&cli.latest, &cli.previous, &options)
        .context("Failed to compare archives")?;

    match cli.format {
        OutputFormat::Csv => CsvExporter::new()
            .export(&report.manifest, &cli.output)
            .with_context(|| format!("Failed to write catalogue {:?}", cli.output))?,
        OutputFormat::Json => JsonExporter::new()
            .export(&report, &cli.output)
            .with_context(|| format!("Failed to write report {:?}", cli.output))?,
    }

    print_summary(&report, &cli.output, cli.timeout);

    Ok(())
}

fn print_summary(report: &ComparisonReport, output: &Path, timeout_secs: u64) {
    let manifest = &report.manifest;

    println!("Catalogue Summary:");
    println!("  Latest:     {}", report.latest);
    println!("  Previous:   {}", report.previous);
    println!("  Added:      {} files", manifest.count(ChangeStatus::Added));
    println!("  Modified:   {} files", manifest.count(ChangeStatus::Modified));
    println!("  Deleted:    {} files", manifest.count(ChangeStatus::Deleted));
    if manifest.count(ChangeStatus::Indeterminate) > 0 {
        println!(
            "  Unreadable: {} files",
            manifest.count(ChangeStatus::Indeterminate)
        );
    }
    println!("  Unchanged:  {} files", report.stats.unchanged);
    println!("  Elapsed:    {:.2}s", report.elapsed.as_secs_f64());
    println!("  Written to: {}", output.display());

    if report.stats.failed > 0 {
        warn!(failed = report.stats.failed, "Some entries could not be compared");
        println!(
            "\nWarning: {} entries could not be read and were not compared",
            report.stats.failed
        );
    }

    if let DrainOutcome::TimedOut { outstanding } = report.outcome {
        let err = Error::DispatchTimeout {
            outstanding,
            seconds: timeout_secs,
        };
        println!("\nWarning: {}, catalogue is partial", err);
    }
}

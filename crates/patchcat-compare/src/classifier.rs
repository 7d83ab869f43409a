//! Classifier
//!
//! Walks the latest and the previous archive and classifies every path:
//!
//! - only in latest: Added
//! - only in previous: Deleted
//! - in both: digests compared on the worker pool, Modified when they differ
//!
//! The Added walk (which also fans out compares) and the Deleted walk run
//! concurrently. All results meet in one [`ManifestSink`].

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use patchcat_archive::{ArchiveEntry, ArchiveIndex};
use patchcat_core::logging::{instrument_phase, log_progress};
use patchcat_core::{ClassificationRecord, Error, Result};
use tracing::{debug, error, info, warn};

use crate::digest::digest_entry;
use crate::dispatcher::WorkDispatcher;
use crate::options::CompareOptions;
use crate::report::{ComparisonReport, StatCounters};
use crate::sink::ManifestSink;

/// State shared by every pass and compare task of one run
struct RunContext {
    latest: Arc<ArchiveIndex>,
    previous: Arc<ArchiveIndex>,
    sink: ManifestSink,
    counters: StatCounters,
    chunk_size: usize,
    strict: bool,
}

/// Stateless comparison engine; each [`Classifier::compare`] is an independent run
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    options: CompareOptions,
}

impl Classifier {
    pub fn new(options: CompareOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &CompareOptions {
        &self.options
    }

    /// Classify every path of `latest` against `previous`
    ///
    /// Entry-level failures never abort the run; they are logged and
    /// counted in the report. A drain timeout yields a partial manifest.
    pub fn compare(
        &self,
        latest: Arc<ArchiveIndex>,
        previous: Arc<ArchiveIndex>,
    ) -> Result<ComparisonReport> {
        let started = Instant::now();
        let dispatcher = WorkDispatcher::new(self.options.workers)?;

        info!(
            latest = %latest.label(),
            previous = %previous.label(),
            workers = self.options.workers,
            "Comparing archives"
        );

        let ctx = Arc::new(RunContext {
            latest,
            previous,
            sink: ManifestSink::new(),
            counters: StatCounters::default(),
            chunk_size: self.options.chunk_size,
            strict: self.options.strict,
        });

        instrument_phase("classify", || {
            std::thread::scope(|scope| {
                scope.spawn(|| deleted_pass(&ctx));
                added_pass(&ctx, &dispatcher);
            })
        });

        let outcome = instrument_phase("drain", || dispatcher.drain(self.options.drain_timeout));
        let manifest = ctx.sink.drain();
        let stats = ctx.counters.snapshot();

        let report = ComparisonReport {
            latest: ctx.latest.label().to_string(),
            previous: ctx.previous.label().to_string(),
            manifest,
            outcome,
            stats,
            elapsed: started.elapsed(),
        };

        info!(
            records = report.manifest.len(),
            added = stats.added,
            modified = stats.modified,
            deleted = stats.deleted,
            unchanged = stats.unchanged,
            failed = stats.failed,
            outstanding = outcome.outstanding(),
            elapsed_ms = %report.elapsed.as_millis(),
            "Comparison finished"
        );

        Ok(report)
    }
}

/// Open both archives in parallel
///
/// Either failure is fatal for the run.
pub fn open_pair(
    latest: impl AsRef<Path> + Send,
    previous: impl AsRef<Path> + Send,
) -> Result<(ArchiveIndex, ArchiveIndex)> {
    let (latest, previous) = rayon::join(
        || ArchiveIndex::open(latest),
        || ArchiveIndex::open(previous),
    );
    Ok((latest?, previous?))
}

/// Open two archives from disk and classify them
pub fn compare_archives(
    latest: impl AsRef<Path> + Send,
    previous: impl AsRef<Path> + Send,
    options: &CompareOptions,
) -> Result<ComparisonReport> {
    let classifier = Classifier::new(options.clone())?;
    let (latest, previous) = instrument_phase("open", || open_pair(latest, previous))?;
    classifier.compare(Arc::new(latest), Arc::new(previous))
}

/// Record paths only in latest, fan out compares for paths in both
fn added_pass(ctx: &Arc<RunContext>, dispatcher: &WorkDispatcher) {
    let total = ctx.latest.entry_count();

    for (i, entry) in ctx.latest.entries().enumerate() {
        match ctx.previous.lookup(&entry.path) {
            None => {
                if ctx.sink.append(ClassificationRecord::added(&entry.path)) {
                    StatCounters::bump(&ctx.counters.added);
                }
            }
            Some(counterpart) => {
                let task_ctx = Arc::clone(ctx);
                let latest_entry = entry.clone();
                let previous_entry = counterpart.clone();
                dispatcher.submit(move || compare_entry(&task_ctx, &latest_entry, &previous_entry));
            }
        }
        log_progress("added pass", i + 1, total);
    }

    debug!(submitted = dispatcher.submitted(), "Added pass done");
}

/// Record paths only in previous
fn deleted_pass(ctx: &RunContext) {
    let total = ctx.previous.entry_count();

    for (i, entry) in ctx.previous.entries().enumerate() {
        if !ctx.latest.contains(&entry.path)
            && ctx.sink.append(ClassificationRecord::deleted(&entry.path))
        {
            StatCounters::bump(&ctx.counters.deleted);
        }
        log_progress("deleted pass", i + 1, total);
    }

    debug!(records = ctx.sink.len(), "Deleted pass done");
}

/// Digest both sides of a path and record it if the content differs
fn compare_entry(ctx: &RunContext, latest_entry: &ArchiveEntry, previous_entry: &ArchiveEntry) {
    let latest = digest_entry(&ctx.latest, latest_entry, ctx.chunk_size);
    let previous = digest_entry(&ctx.previous, previous_entry, ctx.chunk_size);
    let path = &latest_entry.path;

    match (latest, previous) {
        (Ok(latest), Ok(previous)) => {
            if ctx.sink.is_sealed() {
                debug!(path = %path, "Discarding compare result after drain");
                return;
            }
            StatCounters::bump(&ctx.counters.compared);
            if latest == previous {
                StatCounters::bump(&ctx.counters.unchanged);
            } else if ctx.sink.append(ClassificationRecord::modified(path)) {
                StatCounters::bump(&ctx.counters.modified);
            }
        }
        (latest, previous) => {
            if let Err(e) = &latest {
                log_compare_failure(path, ctx.latest.label(), e);
            }
            if let Err(e) = &previous {
                log_compare_failure(path, ctx.previous.label(), e);
            }
            if ctx.sink.is_sealed() {
                return;
            }
            StatCounters::bump(&ctx.counters.failed);
            if ctx.strict {
                ctx.sink.append(ClassificationRecord::indeterminate(path));
            }
        }
    }
}

fn log_compare_failure(path: &str, archive: &str, e: &Error) {
    if e.is_entry_local() {
        warn!(path = %path, archive = %archive, error = %e, "Skipping comparison");
    } else {
        error!(path = %path, archive = %archive, error = %e, "Comparison failed unexpectedly");
    }
}

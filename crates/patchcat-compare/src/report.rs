//! Result of a comparison run

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use patchcat_core::Manifest;
use serde::Serialize;

use crate::dispatcher::DrainOutcome;

/// Counters for one comparison run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CompareStats {
    /// Paths only in the latest archive
    pub added: usize,
    /// Paths only in the previous archive
    pub deleted: usize,
    /// Paths in both archives whose digests were both computed
    pub compared: usize,
    /// Compared paths whose digests differ
    pub modified: usize,
    /// Compared paths with identical content
    pub unchanged: usize,
    /// Paths in both archives where at least one digest failed
    pub failed: usize,
}

/// Live counters updated by the classification passes
#[derive(Debug, Default)]
pub(crate) struct StatCounters {
    pub added: AtomicUsize,
    pub deleted: AtomicUsize,
    pub compared: AtomicUsize,
    pub modified: AtomicUsize,
    pub unchanged: AtomicUsize,
    pub failed: AtomicUsize,
}

impl StatCounters {
    pub fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CompareStats {
        CompareStats {
            added: self.added.load(Ordering::Relaxed),
            deleted: self.deleted.load(Ordering::Relaxed),
            compared: self.compared.load(Ordering::Relaxed),
            modified: self.modified.load(Ordering::Relaxed),
            unchanged: self.unchanged.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Everything a renderer needs from one comparison
#[derive(Debug, Clone)]
pub struct ComparisonReport {
    /// Label of the latest archive
    pub latest: String,
    /// Label of the previous archive
    pub previous: String,
    pub manifest: Manifest,
    pub outcome: DrainOutcome,
    pub stats: CompareStats,
    pub elapsed: Duration,
}

impl ComparisonReport {
    /// Entries skipped because of read failures plus compares abandoned at timeout
    pub fn warning_count(&self) -> usize {
        self.stats.failed + self.outcome.outstanding()
    }

    /// True when every compare finished and none failed
    pub fn is_clean(&self) -> bool {
        self.warning_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(outcome: DrainOutcome, failed: usize) -> ComparisonReport {
        ComparisonReport {
            latest: "b2.zip".to_string(),
            previous: "b1.zip".to_string(),
            manifest: Manifest::default(),
            outcome,
            stats: CompareStats {
                failed,
                ..Default::default()
            },
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn test_warning_count() {
        assert_eq!(report(DrainOutcome::Completed, 0).warning_count(), 0);
        assert!(report(DrainOutcome::Completed, 0).is_clean());
        assert_eq!(report(DrainOutcome::Completed, 2).warning_count(), 2);
        assert_eq!(
            report(DrainOutcome::TimedOut { outstanding: 5 }, 1).warning_count(),
            6
        );
    }

    #[test]
    fn test_snapshot() {
        let counters = StatCounters::default();
        StatCounters::bump(&counters.added);
        StatCounters::bump(&counters.added);
        StatCounters::bump(&counters.failed);
        let stats = counters.snapshot();
        assert_eq!(stats.added, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.modified, 0);
    }
}

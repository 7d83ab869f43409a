//! Manifest Sink
//!
//! Thread-safe, append-only collection point for classification records.
//! Every pass of a comparison appends here concurrently; the finished
//! [`Manifest`] is moved out once all producers are done.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use patchcat_core::{ClassificationRecord, Manifest};

#[derive(Debug, Default)]
pub struct ManifestSink {
    records: Mutex<Vec<ClassificationRecord>>,
    sealed: AtomicBool,
}

impl ManifestSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record. Returns `false` if the sink was already drained.
    pub fn append(&self, record: ClassificationRecord) -> bool {
        let mut records = self.records.lock();
        // Checked under the lock so a record can never slip in after drain
        if self.sealed.load(Ordering::Acquire) {
            return false;
        }
        records.push(record);
        true
    }

    /// Seal the sink and move all records out
    ///
    /// Later calls return an empty manifest.
    pub fn drain(&self) -> Manifest {
        let mut records = self.records.lock();
        self.sealed.store(true, Ordering::Release);
        Manifest::new(std::mem::take(&mut *records))
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    /// Number of records collected so far
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use patchcat_core::ChangeStatus;

    #[test]
    fn test_append_and_drain() {
        let sink = ManifestSink::new();
        assert!(sink.append(ClassificationRecord::added("x.txt")));
        assert!(sink.append(ClassificationRecord::deleted("z.txt")));
        assert_eq!(sink.len(), 2);

        let manifest = sink.drain();
        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.status_of("x.txt"), Some(ChangeStatus::Added));
        assert!(sink.is_sealed());
        assert!(sink.is_empty());
    }

    #[test]
    fn test_append_after_drain_is_rejected() {
        let sink = ManifestSink::new();
        sink.drain();
        assert!(!sink.append(ClassificationRecord::modified("late.bin")));
        assert!(sink.drain().is_empty());
    }

    #[test]
    fn test_concurrent_appends_are_all_kept() {
        let sink = Arc::new(ManifestSink::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let sink = Arc::clone(&sink);
                std::thread::spawn(move || {
                    for i in 0..500 {
                        sink.append(ClassificationRecord::added(format!("t{}/f{}", t, i)));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let manifest = sink.drain();
        assert_eq!(manifest.len(), 4000);
        let mut paths: Vec<_> = manifest.sorted().iter().map(|r| r.path.clone()).collect();
        paths.dedup();
        assert_eq!(paths.len(), 4000);
    }
}

//! Comparison run configuration

use std::time::Duration;

use patchcat_core::{Error, Result};

use crate::digest::DEFAULT_CHUNK_SIZE;

/// Default size of the compare worker pool
pub const DEFAULT_WORKERS: usize = 10;

/// Default time the dispatcher waits for outstanding compares
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(600);

/// Options for one comparison run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompareOptions {
    /// Number of compare workers
    pub workers: usize,
    /// Upper bound on the wait for outstanding compares
    pub drain_timeout: Duration,
    /// Read buffer size used while digesting entries
    pub chunk_size: usize,
    /// Record paths whose digest failed as Indeterminate instead of skipping them
    pub strict: bool,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            chunk_size: DEFAULT_CHUNK_SIZE,
            strict: false,
        }
    }
}

impl CompareOptions {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Reject settings a run cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::invalid_config("worker count must be at least 1"));
        }
        if self.chunk_size == 0 {
            return Err(Error::invalid_config("chunk size must be at least 1 byte"));
        }
        Ok(())
    }
}

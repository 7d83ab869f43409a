//! Unified error handling for patchcat
//!
//! Errors fall into three groups that drive how a comparison run reacts:
//!
//! - **fatal**: the archive could not be opened, nothing can be compared
//! - **entry-local**: one entry could not be read or digested, only that
//!   comparison is skipped
//! - **degraded**: the dispatcher timed out, the manifest is partial

use thiserror::Error;

/// Unified error type for all patchcat operations
#[derive(Error, Debug)]
pub enum Error {
    // ==================== I/O Errors ====================

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ==================== Archive Errors ====================

    /// Archive could not be opened or is not a valid archive
    #[error("Cannot open archive {archive}: {reason}")]
    ArchiveOpen {
        archive: String,
        reason: String,
    },

    /// Invalid magic bytes / record signature
    #[error("Invalid magic bytes: expected {expected:02X?}, found {found:02X?}")]
    InvalidMagic {
        expected: Vec<u8>,
        found: Vec<u8>,
    },

    /// Structural damage inside the archive directory
    #[error("Archive corrupted: {message}")]
    ArchiveCorrupted {
        message: String,
    },

    /// Unsupported compression method
    #[error("Unsupported compression method: {method}")]
    UnsupportedCompression {
        method: String,
    },

    // ==================== Entry Errors ====================

    /// Entry byte stream could not be opened
    #[error("Cannot read entry {path}: {reason}")]
    EntryRead {
        path: String,
        reason: String,
    },

    /// Reading an entry failed while its digest was being computed
    #[error("Digest of {path} failed: {source}")]
    Digest {
        path: String,
        #[source]
        source: std::io::Error,
    },

    // ==================== Dispatch Errors ====================

    /// Compare tasks were still outstanding when the drain timeout elapsed
    #[error("{outstanding} comparisons still outstanding after {seconds} seconds")]
    DispatchTimeout {
        outstanding: usize,
        seconds: u64,
    },

    // ==================== Configuration Errors ====================

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        message: String,
    },

    // ==================== General Errors ====================

    /// Internal error (should not happen)
    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },

    /// Custom error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

/// Result type using the unified Error
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an error with additional context
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Error::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create an archive open error
    pub fn archive_open(archive: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Error::ArchiveOpen {
            archive: archive.into(),
            reason: reason.to_string(),
        }
    }

    /// Create an entry read error
    pub fn entry_read(path: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Error::EntryRead {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a corrupted archive error
    pub fn corrupted(message: impl Into<String>) -> Self {
        Error::ArchiveCorrupted {
            message: message.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Error::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal {
            message: message.into(),
        }
    }

    /// Strip context wrappers down to the originating error
    pub fn root(&self) -> &Error {
        match self {
            Error::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether this error must abort the whole comparison run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.root(),
            Error::ArchiveOpen { .. } | Error::InvalidConfig { .. } | Error::Internal { .. }
        )
    }

    /// Whether this error only affects a single entry comparison
    pub fn is_entry_local(&self) -> bool {
        matches!(
            self.root(),
            Error::EntryRead { .. } | Error::Digest { .. } | Error::UnsupportedCompression { .. }
        )
    }
}

//! patchcat-archive
//!
//! Read-only indexing of ZIP release bundles.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::io::Read;
//! use patchcat_archive::ArchiveIndex;
//!
//! let archive = ArchiveIndex::open("release-2.4.0.zip")?;
//! println!("Found {} entries", archive.entry_count());
//!
//! if let Some(entry) = archive.lookup("conf/server.xml") {
//!     let mut contents = String::new();
//!     archive.open_stream(entry)?.read_to_string(&mut contents)?;
//! }
//! # Ok::<(), patchcat_core::Error>(())
//! ```

pub mod format;
pub mod index;

pub use format::{format_bytes, ArchiveEntry, CompressionMethod};
pub use index::{ArchiveIndex, ArchiveStatistics, EntryStream};

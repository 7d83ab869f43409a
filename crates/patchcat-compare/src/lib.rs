//! Comparison engine for patchcat
//!
//! Given the Archive Index of the latest and of the previous build, the
//! [`Classifier`] produces a [`Manifest`](patchcat_core::Manifest) listing
//! every path that was added, modified or deleted.
//!
//! # Example
//!
//! ```no_run
//! use patchcat_compare::{compare_archives, CompareOptions};
//!
//! let report = compare_archives("release-2.4.zip", "release-2.3.zip", &CompareOptions::default())?;
//! for record in report.manifest.iter() {
//!     println!("{}", record);
//! }
//! # Ok::<(), patchcat_core::Error>(())
//! ```

pub mod classifier;
pub mod digest;
pub mod dispatcher;
pub mod options;
pub mod report;
pub mod sink;

pub use classifier::{compare_archives, open_pair, Classifier};
pub use digest::{digest_bytes, digest_entry, digest_stream, DEFAULT_CHUNK_SIZE};
pub use dispatcher::{DrainOutcome, WorkDispatcher};
pub use options::CompareOptions;
pub use report::{CompareStats, ComparisonReport};
pub use sink::ManifestSink;

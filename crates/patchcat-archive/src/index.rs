//! Archive Index
//!
//! An [`ArchiveIndex`] owns the bytes of one archive (memory mapped for
//! files on disk) together with its parsed central directory. It is
//! immutable after construction, so a single index can be shared across
//! worker threads behind an `Arc` and every worker can open entry streams
//! concurrently.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::ops::Deref;
use std::path::Path;

use memmap2::Mmap;
use patchcat_core::{Error, Result};
use serde::Serialize;
use tracing::{debug, warn};

use crate::format::{self, format_bytes, ArchiveEntry, EntryDecoder, VerifyingReader};

/// Files below this size are read into memory instead of being mapped
const MEMORY_MAPPING_THRESHOLD: u64 = 1024 * 1024;

/// Backing storage of an opened archive
enum ArchiveData {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Deref for ArchiveData {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            ArchiveData::Mapped(map) => &map[..],
            ArchiveData::Owned(bytes) => &bytes[..],
        }
    }
}

/// Read-only index over the entries of one archive
pub struct ArchiveIndex {
    /// Human-readable name of the source (usually its path)
    label: String,
    /// Archive bytes
    data: ArchiveData,
    /// All entries in central directory order
    entries: Vec<ArchiveEntry>,
    /// Path to entry index mapping for fast lookup
    path_index: HashMap<String, usize>,
}

impl ArchiveIndex {
    /// Open and index an archive on disk
    ///
    /// Fails with [`Error::ArchiveOpen`] if the file cannot be read or is
    /// not a valid ZIP archive.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let label = path.display().to_string();

        let file = File::open(path).map_err(|e| Error::archive_open(&label, e))?;
        let len = file
            .metadata()
            .map_err(|e| Error::archive_open(&label, e))?
            .len();

        let data = if len < MEMORY_MAPPING_THRESHOLD {
            let mut bytes = Vec::with_capacity(len as usize);
            (&file)
                .read_to_end(&mut bytes)
                .map_err(|e| Error::archive_open(&label, e))?;
            ArchiveData::Owned(bytes)
        } else {
            ArchiveData::Mapped(map_file(&file).map_err(|e| Error::archive_open(&label, e))?)
        };

        Self::build(label, data)
    }

    /// Index an archive already held in memory
    pub fn from_bytes(label: impl Into<String>, bytes: Vec<u8>) -> Result<Self> {
        Self::build(label.into(), ArchiveData::Owned(bytes))
    }

    fn build(label: String, data: ArchiveData) -> Result<Self> {
        let parsed =
            format::parse_central_directory(&data).map_err(|e| Error::archive_open(&label, e))?;

        let mut entries = Vec::with_capacity(parsed.len());
        let mut path_index = HashMap::with_capacity(parsed.len());
        for entry in parsed {
            if path_index.contains_key(&entry.path) {
                warn!(archive = %label, path = %entry.path, "Duplicate path in central directory, keeping first");
                continue;
            }
            path_index.insert(entry.path.clone(), entries.len());
            entries.push(entry);
        }

        let index = Self {
            label,
            data,
            entries,
            path_index,
        };

        let stats = index.statistics();
        debug!(
            archive = %index.label,
            files = stats.file_count,
            directories = stats.directory_count,
            uncompressed = %format_bytes(stats.total_uncompressed),
            compressed = %format_bytes(stats.total_compressed),
            "Indexed archive"
        );

        Ok(index)
    }

    /// Name of the archive source
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Get total number of entries
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Get an entry by exact, case-sensitive path
    pub fn lookup(&self, path: &str) -> Option<&ArchiveEntry> {
        self.path_index.get(path).map(|idx| &self.entries[*idx])
    }

    /// Check if path exists in archive
    pub fn contains(&self, path: &str) -> bool {
        self.path_index.contains_key(path)
    }

    /// Iterate all entries in central directory order
    ///
    /// Every call starts a fresh traversal in the same order.
    pub fn entries(&self) -> std::slice::Iter<'_, ArchiveEntry> {
        self.entries.iter()
    }

    /// Open the uncompressed byte stream of an entry
    ///
    /// Fails with [`Error::EntryRead`] when the local header is damaged, the
    /// entry is encrypted or its compression method is not supported. Size
    /// and CRC-32 are checked as the stream reaches its end.
    pub fn open_stream(&self, entry: &ArchiveEntry) -> Result<EntryStream<'_>> {
        if entry.is_encrypted {
            return Err(Error::entry_read(&entry.path, "entry is encrypted"));
        }

        let range = format::locate_entry_data(&self.data, entry)
            .map_err(|e| Error::entry_read(&entry.path, e))?;
        let decoder = EntryDecoder::reader(&self.data[range], entry.compression)
            .map_err(|e| Error::entry_read(&entry.path, e))?;

        Ok(EntryStream {
            path: entry.path.clone(),
            inner: VerifyingReader::new(decoder, entry.uncompressed_size, entry.crc32),
        })
    }

    /// Get archive statistics
    pub fn statistics(&self) -> ArchiveStatistics {
        let mut stats = ArchiveStatistics {
            label: self.label.clone(),
            total_entries: self.entries.len(),
            ..Default::default()
        };

        for entry in &self.entries {
            if entry.is_directory {
                stats.directory_count += 1;
            } else {
                stats.file_count += 1;
                stats.total_uncompressed += entry.uncompressed_size;
                stats.total_compressed += entry.compressed_size;
            }
        }

        stats
    }
}

impl std::fmt::Debug for ArchiveIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveIndex")
            .field("label", &self.label)
            .field("bytes", &self.data.len())
            .field("entries", &self.entries.len())
            .finish()
    }
}

#[allow(unsafe_code)]
fn map_file(file: &File) -> std::io::Result<Mmap> {
    // SAFETY: the mapping is read-only and release archives are not
    // modified while a comparison runs.
    unsafe { Mmap::map(file) }
}

/// Uncompressed byte stream of one entry
///
/// Dropping the stream releases it.
pub struct EntryStream<'a> {
    path: String,
    inner: VerifyingReader<Box<dyn Read + Send + 'a>>,
}

impl EntryStream<'_> {
    /// Path of the entry being read
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Read for EntryStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

/// Archive statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArchiveStatistics {
    /// Name of the archive source
    pub label: String,
    /// Total number of entries
    pub total_entries: usize,
    /// Number of files
    pub file_count: usize,
    /// Number of directories
    pub directory_count: usize,
    /// Total uncompressed size in bytes
    pub total_uncompressed: u64,
    /// Total compressed size in bytes
    pub total_compressed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ArchiveIndex>();
    }

    #[test]
    fn test_stream_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<EntryStream<'static>>();
    }

    #[test]
    fn test_from_bytes_rejects_non_archive() {
        let err = ArchiveIndex::from_bytes("notes.txt", b"just some text".to_vec()).unwrap_err();
        assert!(matches!(err, Error::ArchiveOpen { ref archive, .. } if archive == "notes.txt"));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_open_missing_file() {
        let err = ArchiveIndex::open("/nonexistent/patchcat/build.zip").unwrap_err();
        assert!(matches!(err, Error::ArchiveOpen { .. }));
    }
}

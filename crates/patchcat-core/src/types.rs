//! Classification data model
//!
//! A comparison run produces one [`ClassificationRecord`] per path that
//! differs between the two archives. Unchanged paths are never recorded.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Header line that precedes the records of a rendered catalogue
pub const MANIFEST_HEADER: &str = "Status,FileName";

/// Classification of a path between the latest and the previous archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ChangeStatus {
    /// Present only in the latest archive
    Added,
    /// Present in both archives with different content
    Modified,
    /// Present only in the previous archive
    Deleted,
    /// Present in both archives, but at least one side could not be digested
    Indeterminate,
}

impl ChangeStatus {
    /// Single-letter code used in the catalogue
    pub fn code(&self) -> char {
        match self {
            ChangeStatus::Added => 'A',
            ChangeStatus::Modified => 'M',
            ChangeStatus::Deleted => 'D',
            ChangeStatus::Indeterminate => 'I',
        }
    }

    /// All statuses, in catalogue order
    pub fn all() -> [ChangeStatus; 4] {
        [
            ChangeStatus::Added,
            ChangeStatus::Modified,
            ChangeStatus::Deleted,
            ChangeStatus::Indeterminate,
        ]
    }
}

impl fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChangeStatus::Added => "added",
            ChangeStatus::Modified => "modified",
            ChangeStatus::Deleted => "deleted",
            ChangeStatus::Indeterminate => "indeterminate",
        };
        f.write_str(name)
    }
}

/// One line of the change catalogue
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassificationRecord {
    pub status: ChangeStatus,
    pub path: String,
}

impl ClassificationRecord {
    pub fn new(status: ChangeStatus, path: impl Into<String>) -> Self {
        Self {
            status,
            path: path.into(),
        }
    }

    pub fn added(path: impl Into<String>) -> Self {
        Self::new(ChangeStatus::Added, path)
    }

    pub fn modified(path: impl Into<String>) -> Self {
        Self::new(ChangeStatus::Modified, path)
    }

    pub fn deleted(path: impl Into<String>) -> Self {
        Self::new(ChangeStatus::Deleted, path)
    }

    pub fn indeterminate(path: impl Into<String>) -> Self {
        Self::new(ChangeStatus::Indeterminate, path)
    }
}

impl fmt::Display for ClassificationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.status.code(), self.path)
    }
}

/// Content fingerprint of an archive entry (lowercase hex)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest(String);

impl Digest {
    /// Wrap an already hex-encoded fingerprint
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Finalized set of classification records handed to a renderer.
///
/// Record order carries no meaning; [`Manifest::sort`] gives a
/// deterministic order for output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    records: Vec<ClassificationRecord>,
}

impl Manifest {
    pub fn new(records: Vec<ClassificationRecord>) -> Self {
        Self { records }
    }

    /// Header line of the rendered catalogue
    pub fn header(&self) -> &'static str {
        MANIFEST_HEADER
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ClassificationRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records ordered by path, then status
    pub fn sorted(&self) -> Vec<&ClassificationRecord> {
        let mut records: Vec<_> = self.records.iter().collect();
        records.sort_by(|a, b| a.path.cmp(&b.path).then(a.status.cmp(&b.status)));
        records
    }

    /// Number of records with the given status
    pub fn count(&self, status: ChangeStatus) -> usize {
        self.records.iter().filter(|r| r.status == status).count()
    }

    /// Record counts keyed by status (statuses with no records included)
    pub fn counts(&self) -> BTreeMap<ChangeStatus, usize> {
        let mut counts: BTreeMap<ChangeStatus, usize> =
            ChangeStatus::all().into_iter().map(|s| (s, 0)).collect();
        for record in &self.records {
            *counts.entry(record.status).or_insert(0) += 1;
        }
        counts
    }

    /// Status recorded for a path, if any
    pub fn status_of(&self, path: &str) -> Option<ChangeStatus> {
        self.records.iter().find(|r| r.path == path).map(|r| r.status)
    }
}

impl IntoIterator for Manifest {
    type Item = ClassificationRecord;
    type IntoIter = std::vec::IntoIter<ClassificationRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a Manifest {
    type Item = &'a ClassificationRecord;
    type IntoIter = std::slice::Iter<'a, ClassificationRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl FromIterator<ClassificationRecord> for Manifest {
    fn from_iter<I: IntoIterator<Item = ClassificationRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let codes: String = ChangeStatus::all().iter().map(|s| s.code()).collect();
        assert_eq!(codes, "AMDI");
        assert_eq!(ChangeStatus::Indeterminate.to_string(), "indeterminate");
    }

    #[test]
    fn test_record_display() {
        let record = ClassificationRecord::modified("lib/app.jar");
        assert_eq!(record.to_string(), "M,lib/app.jar");
    }

    #[test]
    fn test_digest_is_lowercase() {
        let digest = Digest::from_hex("ABCDEF01");
        assert_eq!(digest.as_str(), "abcdef01");
        assert_eq!(digest, Digest::from_hex("abcdef01"));
    }

    #[test]
    fn test_manifest_sort_and_counts() {
        let manifest: Manifest = vec![
            ClassificationRecord::deleted("y.txt"),
            ClassificationRecord::added("z.txt"),
            ClassificationRecord::modified("a.bin"),
        ]
        .into_iter()
        .collect();

        let paths: Vec<_> = manifest.sorted().into_iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, ["a.bin", "y.txt", "z.txt"]);

        let counts = manifest.counts();
        assert_eq!(counts[&ChangeStatus::Added], 1);
        assert_eq!(counts[&ChangeStatus::Modified], 1);
        assert_eq!(counts[&ChangeStatus::Deleted], 1);
        assert_eq!(counts[&ChangeStatus::Indeterminate], 0);
        assert_eq!(manifest.status_of("y.txt"), Some(ChangeStatus::Deleted));
        assert_eq!(manifest.status_of("x.txt"), None);
        assert_eq!(manifest.header(), "Status,FileName");
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn record_strategy() -> impl Strategy<Value = ClassificationRecord> {
            (0usize..4, "[a-z]{1,3}(/[a-z]{1,3})?").prop_map(|(status, path)| {
                ClassificationRecord::new(ChangeStatus::all()[status], path)
            })
        }

        proptest! {
            #[test]
            fn test_sort_ignores_insertion_order(
                records in proptest::collection::vec(record_strategy(), 0..40),
            ) {
                let forward: Manifest = records.iter().cloned().collect();
                let reverse: Manifest = records.iter().rev().cloned().collect();
                prop_assert_eq!(forward.sorted(), reverse.sorted());

                let total: usize = forward.counts().values().sum();
                prop_assert_eq!(total, records.len());
            }
        }
    }
}

//! Chromosome offset index.
//!
//! Maps a chromosome name to the byte offset and record index of its first record in a sorted
//! file. Entries are discovered lazily by a [`super::RegionReader`] as it scans, and names that
//! were searched for and proven absent are cached as missing so a second query does not rescan.
//!
//! The index is append-only: an entry, once recorded, is never changed. It is shared behind an
//! `Arc<RwLock<..>>`; the owning reader appends while any number of [`IndexView`]s read.

use ahash::AHashMap;
use bstr::{BStr, BString, ByteSlice};
use parking_lot::RwLock;
use std::sync::Arc;

/// First occurrence of a chromosome in a sorted file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Chromosome name.
    pub name: BString,
    /// Byte offset of the chromosome's first record.
    pub offset: u64,
    /// 0-based index of that record among all records of the file.
    pub record_index: u64,
}

/// Result of looking a chromosome up in the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexLookup {
    /// Never seen and never searched for.
    Unknown,
    /// Searched for and proven absent.
    Missing,
    /// Seen at this position.
    Found(IndexEntry),
}

type Entries = AHashMap<BString, Option<IndexEntry>>;

/// Shared, append-only chromosome index. Cloning shares the same underlying index.
#[derive(Debug, Clone, Default)]
pub struct ChromosomeIndex {
    inner: Arc<RwLock<Entries>>,
}

impl ChromosomeIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `name`.
    #[must_use]
    pub fn lookup(&self, name: &[u8]) -> IndexLookup {
        lookup(&self.inner.read(), name)
    }

    /// Record the first occurrence of `name`. Returns false if it was already indexed.
    ///
    /// A name previously cached as missing is replaced by the real entry.
    pub fn record(&self, name: &[u8], offset: u64, record_index: u64) -> bool {
        let mut entries = self.inner.write();
        match entries.get(name.as_bstr()) {
            Some(Some(_)) => false,
            _ => {
                let name = BString::from(name);
                entries.insert(name.clone(), Some(IndexEntry { name, offset, record_index }));
                true
            }
        }
    }

    /// Cache `name` as absent from the file, unless it is already indexed.
    pub fn mark_missing(&self, name: &[u8]) {
        self.inner.write().entry(BString::from(name)).or_insert(None);
    }

    /// A read-only handle onto this index.
    #[must_use]
    pub fn view(&self) -> IndexView {
        IndexView { inner: Arc::clone(&self.inner) }
    }

    /// Number of chromosomes with a recorded position.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().values().filter(|e| e.is_some()).count()
    }

    /// True if no position has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Recorded entries in file order.
    #[must_use]
    pub fn entries(&self) -> Vec<IndexEntry> {
        sorted_entries(&self.inner.read())
    }
}

/// Read-only view of a [`ChromosomeIndex`].
///
/// Views observe entries appended after they were created. A reader seeded from a view gets
/// its own index copy (see [`IndexView::snapshot`]), so views never write.
#[derive(Debug, Clone)]
pub struct IndexView {
    inner: Arc<RwLock<Entries>>,
}

impl IndexView {
    /// Look up `name`.
    #[must_use]
    pub fn lookup(&self, name: &[u8]) -> IndexLookup {
        lookup(&self.inner.read(), name)
    }

    /// Recorded entries in file order.
    #[must_use]
    pub fn entries(&self) -> Vec<IndexEntry> {
        sorted_entries(&self.inner.read())
    }

    /// An independent index seeded with everything known so far.
    #[must_use]
    pub fn snapshot(&self) -> ChromosomeIndex {
        ChromosomeIndex { inner: Arc::new(RwLock::new(self.inner.read().clone())) }
    }
}

fn lookup(entries: &Entries, name: &[u8]) -> IndexLookup {
    match entries.get(name.as_bstr()) {
        None => IndexLookup::Unknown,
        Some(None) => IndexLookup::Missing,
        Some(Some(entry)) => IndexLookup::Found(entry.clone()),
    }
}

fn sorted_entries(entries: &Entries) -> Vec<IndexEntry> {
    let mut out: Vec<IndexEntry> = entries.values().flatten().cloned().collect();
    out.sort_by_key(|e| e.offset);
    out
}

impl std::fmt::Display for IndexEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name: &BStr = self.name.as_ref();
        write!(f, "{name}@{} (record {})", self.offset, self.record_index)
    }
}

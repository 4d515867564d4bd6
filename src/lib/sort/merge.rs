//! K-way merge of sorted chunks.
//!
//! The merger keeps one reader per chunk and a min-heap of each reader's head record, ordered
//! by `(comparator, chunk sequence)`. The sequence tie-break makes the merge stable: records
//! with equal keys come out in chunk creation order, and since each chunk was stable-sorted,
//! in input order overall. A chunk's file is deleted as soon as its reader is exhausted.
//!
//! A pairwise merge tree would bound open readers to two per node and parallelise across tree
//! width; the heap is used here because its stability argument is a single comparison.

use anyhow::{Context, Result};
use log::debug;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::io::Write;

use super::chunk::{Chunk, ChunkReader};
use crate::comparator::{Comparator, KeyedRecord};
use crate::record::Delimiter;
use crate::text_io::write_line;

/// Entry in the merge heap.
struct HeapEntry<'a> {
    record: KeyedRecord,
    seq: usize,
    reader_idx: usize,
    comparator: &'a Comparator,
}

impl PartialEq for HeapEntry<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry<'_> {}

impl PartialOrd for HeapEntry<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.comparator
            .compare_keyed(&self.record, &other.record)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Pull-based k-way merger over sorted chunks.
pub struct KWayMerger<'a> {
    readers: Vec<Option<ChunkReader>>,
    heap: BinaryHeap<Reverse<HeapEntry<'a>>>,
    comparator: &'a Comparator,
}

impl<'a> KWayMerger<'a> {
    /// Open every chunk and prime the heap with each chunk's first record.
    pub fn new(chunks: Vec<Chunk>, comparator: &'a Comparator, delimiter: Delimiter) -> Result<Self> {
        let mut merger = Self {
            readers: Vec::with_capacity(chunks.len()),
            heap: BinaryHeap::with_capacity(chunks.len()),
            comparator,
        };
        for chunk in chunks {
            let reader = ChunkReader::open(chunk, delimiter)?;
            merger.readers.push(Some(reader));
            merger.advance(merger.readers.len() - 1)?;
        }
        Ok(merger)
    }

    /// Number of chunks still being merged.
    #[must_use]
    pub fn open_chunks(&self) -> usize {
        self.readers.iter().filter(|r| r.is_some()).count()
    }

    /// Pull the next record from reader `idx` into the heap, deleting its chunk when done.
    fn advance(&mut self, idx: usize) -> Result<()> {
        let Some(reader) = self.readers[idx].as_mut() else {
            return Ok(());
        };
        match reader.next_record(self.comparator)? {
            Some(record) => {
                let seq = reader.seq();
                self.heap.push(Reverse(HeapEntry {
                    record,
                    seq,
                    reader_idx: idx,
                    comparator: self.comparator,
                }));
            }
            None => {
                if let Some(reader) = self.readers[idx].take() {
                    debug!("Chunk {} exhausted", reader.seq());
                    reader.delete();
                }
            }
        }
        Ok(())
    }

    /// Next record in merged order.
    pub fn next_record(&mut self) -> Result<Option<KeyedRecord>> {
        let Some(Reverse(entry)) = self.heap.pop() else {
            return Ok(None);
        };
        self.advance(entry.reader_idx)?;
        Ok(Some(entry.record))
    }

    /// Drain the merge into `sink`, one line per record. Returns the number of records written.
    pub fn write_to<W: Write>(mut self, sink: &mut W) -> Result<u64> {
        let mut written = 0u64;
        while let Some(record) = self.next_record()? {
            write_line(sink, record.as_bytes()).context("Failed to write merged output")?;
            written += 1;
        }
        Ok(written)
    }
}

impl Iterator for KWayMerger<'_> {
    type Item = Result<KeyedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

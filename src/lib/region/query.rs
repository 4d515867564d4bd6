//! Region query orchestration: in memory first, on disk when that runs out of room.
//!
//! [`RegionQueryEngine::query`] collects the matches of a region into memory and sorts them by
//! the pairing comparator. If the matches outgrow the in-memory budget (or an allocation
//! fails) the partial results are dropped, the reader is rewound to where the query began, and
//! the query is replayed on disk: the reader feeds raw lines through a bounded channel to a
//! consumer thread that runs an [`ExternalSorter`] into a temporary file. Both strategies
//! produce the same records in the same order.

use anyhow::{Context, Result, anyhow};
use bstr::BString;
use crossbeam_channel::bounded;
use log::{debug, warn};
use std::fs::File;
use std::io::{self, BufWriter, Read, Seek, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

use super::Region;
use super::reader::{QueryStatus, RegionReader};
use super::retry::RetryPolicy;
use crate::comparator::{Comparator, KeyedRecord};
use crate::line_buffer::LineBuffer;
use crate::logging::format_bytes;
use crate::record::{Delimiter, Record};
use crate::sort::ExternalSorter;
use crate::text_io::{IO_BUFFER_SIZE, SourceItem};

/// Default in-memory budget for one query's results (256 MB).
pub const DEFAULT_RAM_BUDGET: usize = 256 * 1024 * 1024;

/// Default per-chunk memory limit of the disk fallback sort (64 MB).
pub const DEFAULT_FALLBACK_MEMORY_LIMIT: usize = 64 * 1024 * 1024;

/// Lines buffered between the fallback producer and consumer.
const PIPE_CAPACITY: usize = 4096;

/// Creates the staging file for disk results in the given directory (or the system default).
type TempFileFactory = fn(Option<&Path>) -> io::Result<NamedTempFile>;

fn create_temp_file(dir: Option<&Path>) -> io::Result<NamedTempFile> {
    match dir {
        Some(dir) => NamedTempFile::new_in(dir),
        None => NamedTempFile::new(),
    }
}

/// The in-memory attempt ran out of room.
#[derive(Debug, Error)]
#[error("region results exceeded the in-memory budget")]
struct MemoryExhausted;

/// Records of one region query.
pub enum RegionRecords {
    /// Results held in memory.
    Memory(std::vec::IntoIter<Record>),
    /// Results streamed from a sorted temporary file.
    Disk(DiskRecords),
}

impl RegionRecords {
    /// True if the results come from the disk fallback.
    #[must_use]
    pub fn is_on_disk(&self) -> bool {
        matches!(self, Self::Disk(_))
    }

    /// Read every record into a vector.
    pub fn into_vec(self) -> Result<Vec<Record>> {
        self.collect()
    }
}

impl Iterator for RegionRecords {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Memory(records) => records.next().map(Ok),
            Self::Disk(records) => records.next(),
        }
    }
}

/// Iterator over a sorted temporary result file. The file is deleted once exhausted or
/// dropped.
pub struct DiskRecords {
    lines: Option<LineBuffer<File>>,
    file: Option<NamedTempFile>,
    delimiter: Delimiter,
}

impl DiskRecords {
    fn new(file: NamedTempFile, reader: File, delimiter: Delimiter) -> Self {
        Self {
            lines: Some(LineBuffer::with_capacity(reader, IO_BUFFER_SIZE)),
            file: Some(file),
            delimiter,
        }
    }

    /// Path of the backing file while it still exists.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.file.as_ref().map(NamedTempFile::path)
    }

    fn close(&mut self) {
        self.lines = None;
        if let Some(file) = self.file.take() {
            if let Err(e) = file.close() {
                warn!("Failed to delete fallback result file: {e}");
            }
        }
    }
}

impl Iterator for DiskRecords {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let lines = self.lines.as_mut()?;
        let next = match lines.next_line() {
            Ok(Some(line)) => Some(Ok(Record::new(line.bytes.to_vec(), self.delimiter))),
            Ok(None) => None,
            Err(e) => Some(Err(anyhow::Error::from(e).context("Failed to read fallback results"))),
        };
        if next.is_none() {
            self.close();
        }
        next
    }
}

/// Result of [`RegionQueryEngine::query`].
pub struct QueryResult {
    /// Matching records, sorted by the pairing comparator.
    pub records: RegionRecords,
    /// How the query ended.
    pub status: QueryStatus,
    /// Chromosome of the record the reader stopped at, if any.
    pub next_chromosome: Option<BString>,
    /// Number of records in `records`.
    pub matched: u64,
}

/// Runs region queries with a RAM-first, disk-fallback strategy.
pub struct RegionQueryEngine<R> {
    reader: RegionReader<R>,
    pairing: Comparator,
    ram_budget: usize,
    retry: RetryPolicy,
    temp_dir: Option<PathBuf>,
    create_temp: TempFileFactory,
    fallback_memory_limit: usize,
    default_limit: Option<usize>,
}

impl RegionQueryEngine<File> {
    /// Open an uncompressed sorted file with default settings.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(RegionReader::open(path)?))
    }
}

impl<R: Read + Seek> RegionQueryEngine<R> {
    /// Wrap a reader. Results are ordered by BED order unless [`Self::pairing`] says otherwise.
    pub fn new(reader: RegionReader<R>) -> Self {
        Self {
            reader,
            pairing: Comparator::bed(),
            ram_budget: DEFAULT_RAM_BUDGET,
            retry: RetryPolicy::default(),
            temp_dir: None,
            create_temp: create_temp_file,
            fallback_memory_limit: DEFAULT_FALLBACK_MEMORY_LIMIT,
            default_limit: None,
        }
    }

    /// Set the comparator results are sorted by (e.g. to order paired-end mates).
    ///
    /// Records it cannot key (missing fields, non-numeric values) are skipped and counted as
    /// malformed by the reader.
    #[must_use]
    pub fn pairing(mut self, comparator: Comparator) -> Self {
        self.reader = self.reader.require_keys(comparator.clone());
        self.pairing = comparator;
        self
    }

    /// Set the in-memory budget for one query's results, in bytes.
    #[must_use]
    pub fn ram_budget(mut self, bytes: usize) -> Self {
        self.ram_budget = bytes;
        self
    }

    /// Set the retry policy for fallback I/O.
    #[must_use]
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Set the directory for fallback temporary files.
    #[must_use]
    pub fn temp_dir(mut self, path: PathBuf) -> Self {
        self.temp_dir = Some(path);
        self
    }

    #[cfg(test)]
    fn temp_file_factory(mut self, factory: TempFileFactory) -> Self {
        self.create_temp = factory;
        self
    }

    /// Set the per-chunk memory limit of the fallback sort.
    #[must_use]
    pub fn fallback_memory_limit(mut self, bytes: usize) -> Self {
        self.fallback_memory_limit = bytes;
        self
    }

    /// Cap applied when a query passes no limit of its own.
    #[must_use]
    pub fn default_limit(mut self, limit: Option<usize>) -> Self {
        self.default_limit = limit;
        self
    }

    /// The underlying reader.
    #[must_use]
    pub fn reader(&self) -> &RegionReader<R> {
        &self.reader
    }

    /// Mutable access to the underlying reader.
    pub fn reader_mut(&mut self) -> &mut RegionReader<R> {
        &mut self.reader
    }

    /// Reposition to the first record of `chromosome`; see [`RegionReader::reset_to_chromosome`].
    pub fn reset_to_chromosome(&mut self, chromosome: &[u8]) -> Result<bool> {
        self.reader.reset_to_chromosome(chromosome)
    }

    /// Reposition to a byte offset and record index; see [`RegionReader::reset`].
    pub fn reset(&mut self, offset: u64, record_index: u64) -> Result<()> {
        self.reader.reset(offset, record_index)
    }

    /// Answer a region query, at most `limit` records (or the default limit).
    pub fn query(&mut self, region: &Region, limit: Option<usize>) -> Result<QueryResult> {
        let limit = limit.or(self.default_limit);
        let saved = self.reader.cursor();
        match self.query_in_memory(region, limit) {
            Err(e) if e.is::<MemoryExhausted>() => {
                std::thread::yield_now();
                warn!(
                    "Results for {region} exceed the in-memory budget of {}; falling back to disk",
                    format_bytes(self.ram_budget as u64)
                );
                self.reader.restore(saved)?;
                self.query_on_disk(region, limit)
            }
            other => other,
        }
    }

    /// Force the disk strategy, bypassing the in-memory attempt.
    pub fn query_on_disk(&mut self, region: &Region, limit: Option<usize>) -> Result<QueryResult> {
        let delimiter = self.reader.line_format().delimiter;
        let staged = self.retry.run("create fallback temp file", region, || {
            (self.create_temp)(self.temp_dir.as_deref())
        })?;

        let mut sorter = ExternalSorter::new(self.pairing.clone())
            .memory_limit(self.fallback_memory_limit)
            .delimiter(delimiter)
            .temp_compression(0);
        if let Some(dir) = &self.temp_dir {
            sorter = sorter.temp_dir(dir.clone());
        }

        let pairing = &self.pairing;
        let sorter = &sorter;
        let output = staged.as_file();
        let (outcome, stats) = std::thread::scope(|scope| -> Result<_> {
            let (tx, rx) = bounded::<Box<[u8]>>(PIPE_CAPACITY);
            let consumer = scope.spawn(move || -> Result<_> {
                let items = rx.into_iter().map(|line| -> Result<SourceItem> {
                    let record = pairing.key(Record::new(line, delimiter))?;
                    Ok(SourceItem::Record { record, line_number: 0 })
                });
                let mut writer = BufWriter::with_capacity(IO_BUFFER_SIZE, output);
                let stats = sorter.sort_items(items, &mut writer)?;
                writer.flush().context("Failed to flush fallback results")?;
                Ok(stats)
            });

            let produced = self.reader.query_with(
                region.chromosome.as_slice(),
                region.start,
                region.end,
                limit,
                |record| {
                    tx.send(record.into_bytes())
                        .map_err(|_| anyhow!("Fallback sort stopped before all records were sent"))
                },
            );
            drop(tx);

            let stats = consumer
                .join()
                .map_err(|_| anyhow!("Fallback sort thread panicked"))?
                .with_context(|| format!("Disk fallback failed for {region}"))?;
            Ok((produced?, stats))
        })?;

        let reader = self.retry.run("reopen fallback results", region, || staged.reopen())?;
        debug!(
            "Disk fallback for {region}: {} records in {} chunks",
            stats.output_records, stats.chunks_written
        );
        Ok(QueryResult {
            records: RegionRecords::Disk(DiskRecords::new(staged, reader, delimiter)),
            status: outcome.status,
            next_chromosome: outcome.next_chromosome,
            matched: outcome.matched,
        })
    }

    fn query_in_memory(&mut self, region: &Region, limit: Option<usize>) -> Result<QueryResult> {
        let pairing = &self.pairing;
        let budget = self.ram_budget;
        let mut records: Vec<KeyedRecord> = Vec::new();
        let mut bytes = 0usize;

        let outcome = self.reader.query_with(
            region.chromosome.as_slice(),
            region.start,
            region.end,
            limit,
            |record| {
                let keyed = pairing.key(record)?;
                bytes += keyed.heap_size();
                if bytes > budget {
                    return Err(MemoryExhausted.into());
                }
                records.try_reserve(1).map_err(|_| MemoryExhausted)?;
                records.push(keyed);
                Ok(())
            },
        )?;

        records.sort_by(|a, b| pairing.compare_keyed(a, b));
        let records: Vec<Record> = records.into_iter().map(KeyedRecord::into_record).collect();
        Ok(QueryResult {
            records: RegionRecords::Memory(records.into_iter()),
            status: outcome.status,
            next_chromosome: outcome.next_chromosome,
            matched: outcome.matched,
        })
    }
}

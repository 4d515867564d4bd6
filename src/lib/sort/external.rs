//! External merge-sort for line-oriented record files.
//!
//! Handles inputs larger than RAM by spilling sorted chunks to temporary files.
//!
//! # Algorithm
//!
//! 1. **Divide**: stream records into a batch until its byte size reaches the memory limit
//!    (or, optionally, free system memory runs low)
//! 2. **Sort**: hand each cut batch to a bounded pool of worker threads; each worker
//!    stable-sorts its batch and writes it as a chunk file. When every worker is busy the
//!    divider blocks instead of buffering more batches.
//! 3. **Merge**: k-way merge of the chunks (see [`super::merge`])
//!
//! If the whole input fits in a single batch nothing is spilled: the batch is sorted in memory
//! and written directly. Output files are written to a temporary file next to the destination
//! and renamed into place only after the last record has been written.

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use log::{debug, info};
use rayon::prelude::*;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};

use super::chunk::{Chunk, chunk_path, write_sorted_chunk};
use super::memory::{MemoryMonitor, MemoryPressure};
use super::merge::KWayMerger;
use crate::comparator::{Comparator, KeyedRecord};
use crate::logging::format_bytes;
use crate::progress::ProgressTracker;
use crate::record::Delimiter;
use crate::text_io::{IO_BUFFER_SIZE, LineFormat, RecordSource, SourceItem, open_input, write_line};

/// Default memory limit per chunk (512 MB).
pub const DEFAULT_MEMORY_LIMIT: usize = 512 * 1024 * 1024;

/// Default gzip level for temporary chunk files.
const TEMP_COMPRESSION_LEVEL: u32 = 1;

/// External sorter for record files.
#[derive(Debug, Clone)]
pub struct ExternalSorter {
    /// Sort order.
    comparator: Comparator,
    /// Maximum bytes held in one in-memory batch.
    memory_limit: usize,
    /// Temporary directory for spill files.
    temp_dir: Option<PathBuf>,
    /// Number of chunk-sorting workers.
    threads: usize,
    /// Delimiter and header prefixes.
    format: LineFormat,
    /// Copy header lines to the head of the output.
    keep_headers: bool,
    /// Optional free-memory sampling.
    memory_pressure: Option<MemoryPressure>,
    /// Gzip level for chunk files (0 = uncompressed).
    temp_compression: u32,
}

impl ExternalSorter {
    /// Create a new external sorter ordering records by `comparator`.
    #[must_use]
    pub fn new(comparator: Comparator) -> Self {
        Self {
            comparator,
            memory_limit: DEFAULT_MEMORY_LIMIT,
            temp_dir: None,
            threads: 1,
            format: LineFormat::default(),
            keep_headers: true,
            memory_pressure: None,
            temp_compression: TEMP_COMPRESSION_LEVEL,
        }
    }

    /// Set the per-chunk memory limit in bytes.
    #[must_use]
    pub fn memory_limit(mut self, limit: usize) -> Self {
        self.memory_limit = limit.max(1);
        self
    }

    /// Set the temporary directory for spill files.
    #[must_use]
    pub fn temp_dir(mut self, path: PathBuf) -> Self {
        self.temp_dir = Some(path);
        self
    }

    /// Set the number of worker threads.
    #[must_use]
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    /// Set the field delimiter.
    #[must_use]
    pub fn delimiter(mut self, delimiter: Delimiter) -> Self {
        self.format = self.format.delimiter(delimiter);
        self
    }

    /// Replace the header/comment line prefixes.
    #[must_use]
    pub fn comment_prefixes<I, P>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<[u8]>,
    {
        self.format = self.format.comment_prefixes(prefixes);
        self
    }

    /// Copy header lines to the output (true) or drop them (false).
    #[must_use]
    pub fn keep_headers(mut self, keep: bool) -> Self {
        self.keep_headers = keep;
        self
    }

    /// Enable free-memory sampling as an extra chunk-cut trigger.
    #[must_use]
    pub fn memory_pressure(mut self, settings: Option<MemoryPressure>) -> Self {
        self.memory_pressure = settings;
        self
    }

    /// Set the gzip level for chunk files (0 disables compression).
    #[must_use]
    pub fn temp_compression(mut self, level: u32) -> Self {
        self.temp_compression = level;
        self
    }

    /// The comparator records are sorted by.
    #[must_use]
    pub fn comparator(&self) -> &Comparator {
        &self.comparator
    }

    /// The line format used to read input.
    #[must_use]
    pub fn format(&self) -> &LineFormat {
        &self.format
    }

    /// Sort `input` (plain, gzip, or `-` for stdin) into `output` (`-` for stdout).
    ///
    /// File output is written beside the destination and renamed into place on success, so a
    /// failed sort never leaves a truncated file at `output`.
    pub fn sort(&self, input: &Path, output: &Path) -> Result<SortStats> {
        info!("Starting sort with fields: {}", self.comparator);
        info!("Memory limit: {}", format_bytes(self.memory_limit as u64));
        info!("Threads: {}", self.threads);

        let reader = open_input(input)?;
        let description = input.display().to_string();

        if output.as_os_str() == "-" {
            let stdout = std::io::stdout();
            let mut writer = BufWriter::with_capacity(IO_BUFFER_SIZE, stdout.lock());
            let stats = self.sort_reader(reader, &description, &mut writer)?;
            writer.flush().context("Failed to flush output")?;
            return Ok(stats);
        }

        let dir = match output.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut staged = NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create output in {}", dir.display()))?;
        let stats = {
            let mut writer = BufWriter::with_capacity(IO_BUFFER_SIZE, staged.as_file_mut());
            let stats = self.sort_reader(reader, &description, &mut writer)?;
            writer.flush().context("Failed to flush output")?;
            stats
        };
        staged
            .persist(output)
            .with_context(|| format!("Failed to write output: {}", output.display()))?;
        Ok(stats)
    }

    /// Sort lines read from `reader` into `sink`.
    ///
    /// Malformed lines are skipped and counted; if every data line is malformed the sort fails
    /// with [`crate::errors::RegsortError::NoValidRecords`].
    pub fn sort_reader<R: Read, W: Write>(
        &self,
        reader: R,
        description: &str,
        sink: &mut W,
    ) -> Result<SortStats> {
        let mut source = RecordSource::new(reader, self.format.clone(), description);
        let comparator = &self.comparator;
        let items = std::iter::from_fn(|| source.next_item(comparator).transpose());
        let mut stats = self.sort_items(items, sink)?;
        source.ensure_any_valid()?;
        stats.invalid_lines = source.invalid_lines();
        Ok(stats)
    }

    /// Sort a stream of headers and records into `sink`.
    ///
    /// Records must have been keyed by this sorter's comparator.
    pub fn sort_items<I, W>(&self, items: I, sink: &mut W) -> Result<SortStats>
    where
        I: IntoIterator<Item = Result<SourceItem>>,
        W: Write,
    {
        let temp_dir = self.create_temp_dir()?;
        let mut stats = SortStats::default();
        let mut headers: Vec<Vec<u8>> = Vec::new();

        info!("Phase 1: Reading and sorting chunks...");
        let (chunks, remainder) = std::thread::scope(|scope| -> Result<_> {
            let (job_tx, job_rx) = bounded::<(usize, Vec<KeyedRecord>)>(0);
            let (done_tx, done_rx) = unbounded::<Result<Chunk>>();
            for _ in 0..self.threads {
                let job_rx = job_rx.clone();
                let done_tx = done_tx.clone();
                let dir = temp_dir.path();
                scope.spawn(move || self.run_worker(dir, &job_rx, &done_tx));
            }
            drop(job_rx);
            drop(done_tx);

            let mut pool = ChunkPool { job_tx, done_rx, completed: Vec::new(), submitted: 0 };
            let remainder = self.divide(items, &mut pool, &mut stats, &mut headers)?;
            Ok((pool.finish()?, remainder))
        })?;

        info!("Read {} records total", stats.total_records);

        if self.keep_headers {
            for header in &headers {
                write_line(sink, header).context("Failed to write header")?;
            }
        }

        if chunks.is_empty() {
            info!("All records fit in memory, performing in-memory sort");
            let mut batch = remainder;
            if self.threads > 1 {
                batch.par_sort_by(|a, b| self.comparator.compare_keyed(a, b));
            } else {
                batch.sort_by(|a, b| self.comparator.compare_keyed(a, b));
            }
            for record in &batch {
                write_line(sink, record.as_bytes()).context("Failed to write output")?;
            }
            stats.output_records = batch.len() as u64;
        } else {
            stats.chunks_written = chunks.len();
            info!("Phase 2: Merging {} chunks...", chunks.len());
            let merger = KWayMerger::new(chunks, &self.comparator, self.format.delimiter)?;
            stats.output_records = merger.write_to(sink)?;
        }

        info!("Sort complete: {} records processed", stats.total_records);
        Ok(stats)
    }

    /// Batch records and submit full batches to the workers.
    ///
    /// Returns the unsubmitted final batch when nothing was spilled, so the caller can sort it
    /// in memory; otherwise the final batch is submitted like any other and an empty vector
    /// is returned.
    fn divide<I>(
        &self,
        items: I,
        pool: &mut ChunkPool,
        stats: &mut SortStats,
        headers: &mut Vec<Vec<u8>>,
    ) -> Result<Vec<KeyedRecord>>
    where
        I: IntoIterator<Item = Result<SourceItem>>,
    {
        let progress = ProgressTracker::new("Read records");
        let mut monitor = self.memory_pressure.map(MemoryMonitor::new);
        let mut batch: Vec<KeyedRecord> = Vec::new();
        let mut batch_bytes = 0usize;

        for item in items {
            match item? {
                SourceItem::Header(line) => {
                    stats.header_lines += 1;
                    headers.push(line);
                }
                SourceItem::Record { record, .. } => {
                    stats.total_records += 1;
                    progress.record(1);
                    batch_bytes += record.heap_size();
                    batch.push(record);

                    let pressure = monitor.as_mut().is_some_and(MemoryMonitor::tick);
                    if batch_bytes >= self.memory_limit || pressure {
                        debug!(
                            "Cutting chunk {}: {} records, {}",
                            pool.submitted,
                            batch.len(),
                            format_bytes(batch_bytes as u64)
                        );
                        pool.submit(std::mem::take(&mut batch))?;
                        batch_bytes = 0;
                        if let Some(m) = monitor.as_mut() {
                            m.reset();
                        }
                    }
                }
            }
        }
        progress.finish();

        if pool.submitted > 0 && !batch.is_empty() {
            pool.submit(std::mem::take(&mut batch))?;
        }
        Ok(batch)
    }

    /// Worker loop: sort and spill batches until the job channel closes or a write fails.
    fn run_worker(
        &self,
        dir: &Path,
        job_rx: &Receiver<(usize, Vec<KeyedRecord>)>,
        done_tx: &Sender<Result<Chunk>>,
    ) {
        for (seq, batch) in job_rx {
            let result = write_sorted_chunk(
                batch,
                &self.comparator,
                &chunk_path(dir, seq),
                seq,
                self.temp_compression,
                false,
            );
            let failed = result.is_err();
            if done_tx.send(result).is_err() || failed {
                break;
            }
        }
    }

    /// Create temporary directory for spill files.
    fn create_temp_dir(&self) -> Result<TempDir> {
        match &self.temp_dir {
            Some(base) => {
                std::fs::create_dir_all(base)?;
                TempDir::new_in(base).context("Failed to create temp directory")
            }
            None => TempDir::new().context("Failed to create temp directory"),
        }
    }
}

/// Producer side of the chunk-sorting worker pool.
struct ChunkPool {
    job_tx: Sender<(usize, Vec<KeyedRecord>)>,
    done_rx: Receiver<Result<Chunk>>,
    completed: Vec<Chunk>,
    submitted: usize,
}

impl ChunkPool {
    /// Hand a batch to the workers, blocking while every worker is busy.
    ///
    /// Fails fast if a worker already reported a chunk write failure.
    fn submit(&mut self, batch: Vec<KeyedRecord>) -> Result<()> {
        self.collect_finished()?;
        if self.job_tx.send((self.submitted, batch)).is_err() {
            self.collect_finished()?;
            return Err(anyhow!("Chunk sorting workers stopped unexpectedly"));
        }
        self.submitted += 1;
        Ok(())
    }

    /// Move finished chunks off the result channel, surfacing the first failure.
    fn collect_finished(&mut self) -> Result<()> {
        for result in self.done_rx.try_iter() {
            self.completed.push(result.context("Failed to write sorted chunk")?);
        }
        Ok(())
    }

    /// Close the job channel and wait for every outstanding chunk, in sequence order.
    fn finish(self) -> Result<Vec<Chunk>> {
        let Self { job_tx, done_rx, mut completed, submitted } = self;
        drop(job_tx);
        for result in done_rx {
            completed.push(result.context("Failed to write sorted chunk")?);
        }
        if completed.len() != submitted {
            return Err(anyhow!("Expected {submitted} chunks but {} were written", completed.len()));
        }
        completed.sort_by_key(|c| c.seq);
        Ok(completed)
    }
}

/// Statistics from a sort operation.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct SortStats {
    /// Total records read from input.
    pub total_records: u64,
    /// Records written to output.
    pub output_records: u64,
    /// Malformed lines skipped.
    pub invalid_lines: u64,
    /// Header/comment lines seen.
    pub header_lines: u64,
    /// Number of temporary chunk files written.
    pub chunks_written: usize,
}

//! Temporary sorted runs ("chunks") written during external sort.
//!
//! A chunk is a text file holding one batch of records, already sorted, one line per record.
//! Chunks may be gzip-compressed; readers detect compression from the magic bytes. Each chunk
//! carries its creation sequence number, which the merger uses as the stability tie-break.

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use log::{debug, warn};
use rayon::prelude::*;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::comparator::{Comparator, KeyedRecord};
use crate::line_buffer::LineBuffer;
use crate::record::Delimiter;
use crate::text_io::write_line;

/// Buffer size for chunk files.
const CHUNK_BUFFER_SIZE: usize = 256 * 1024;

/// A sorted run on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Path of the chunk file.
    pub path: PathBuf,
    /// Number of records in the chunk.
    pub records: u64,
    /// Creation order; lower sequence numbers win ties during merge.
    pub seq: usize,
}

/// File name for chunk `seq` inside a temp directory.
#[must_use]
pub fn chunk_path(dir: &Path, seq: usize) -> PathBuf {
    dir.join(format!("chunk_{seq:06}.txt"))
}

/// Temp chunk output, raw or gzip-compressed.
enum ChunkWriterInner {
    Raw(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl Write for ChunkWriterInner {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Raw(w) => w.write(buf),
            Self::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Raw(w) => w.flush(),
            Self::Gzip(w) => w.flush(),
        }
    }
}

/// Writer for one chunk file.
pub struct ChunkWriter {
    writer: ChunkWriterInner,
    path: PathBuf,
    seq: usize,
    records: u64,
}

impl ChunkWriter {
    /// Create a chunk file. `compression_level` 0 writes plain text.
    pub fn create(path: &Path, seq: usize, compression_level: u32) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create chunk file: {}", path.display()))?;
        let buf = BufWriter::with_capacity(CHUNK_BUFFER_SIZE, file);
        let writer = if compression_level == 0 {
            ChunkWriterInner::Raw(buf)
        } else {
            ChunkWriterInner::Gzip(GzEncoder::new(buf, Compression::new(compression_level.min(9))))
        };
        Ok(Self { writer, path: path.to_path_buf(), seq, records: 0 })
    }

    /// Append one record line.
    #[inline]
    pub fn write_record(&mut self, line: &[u8]) -> Result<()> {
        write_line(&mut self.writer, line)
            .with_context(|| format!("Failed to write chunk file: {}", self.path.display()))?;
        self.records += 1;
        Ok(())
    }

    /// Flush everything to disk and describe the finished chunk.
    pub fn finish(self) -> Result<Chunk> {
        let context = || format!("Failed to finish chunk file: {}", self.path.display());
        let mut buf = match self.writer {
            ChunkWriterInner::Raw(w) => w,
            ChunkWriterInner::Gzip(w) => w.finish().with_context(context)?,
        };
        buf.flush().with_context(context)?;
        Ok(Chunk { path: self.path, records: self.records, seq: self.seq })
    }
}

/// Sort a batch (stable, so equal keys keep input order) and write it as chunk `seq`.
pub fn write_sorted_chunk(
    mut batch: Vec<KeyedRecord>,
    comparator: &Comparator,
    path: &Path,
    seq: usize,
    compression_level: u32,
    parallel: bool,
) -> Result<Chunk> {
    if parallel {
        batch.par_sort_by(|a, b| comparator.compare_keyed(a, b));
    } else {
        batch.sort_by(|a, b| comparator.compare_keyed(a, b));
    }

    let mut writer = ChunkWriter::create(path, seq, compression_level)?;
    for record in &batch {
        writer.write_record(record.as_bytes())?;
    }
    let chunk = writer.finish()?;
    debug!("Wrote chunk {} ({} records) to {}", chunk.seq, chunk.records, chunk.path.display());
    Ok(chunk)
}

/// Streaming reader over one chunk, re-keying each line with the merge comparator.
pub struct ChunkReader {
    lines: LineBuffer<Box<dyn Read + Send>>,
    chunk: Chunk,
    delimiter: Delimiter,
}

impl ChunkReader {
    /// Open a chunk, auto-detecting gzip compression.
    pub fn open(chunk: Chunk, delimiter: Delimiter) -> Result<Self> {
        let file = File::open(&chunk.path)
            .with_context(|| format!("Failed to open chunk file: {}", chunk.path.display()))?;
        let mut reader = BufReader::with_capacity(CHUNK_BUFFER_SIZE, file);

        let mut magic = [0u8; 2];
        let is_compressed = match reader.read_exact(&mut magic) {
            Ok(()) => magic == [0x1f, 0x8b],
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => false,
            Err(e) => return Err(e.into()),
        };
        reader.seek(SeekFrom::Start(0))?;

        let inner: Box<dyn Read + Send> =
            if is_compressed { Box::new(MultiGzDecoder::new(reader)) } else { Box::new(reader) };
        Ok(Self { lines: LineBuffer::with_capacity(inner, CHUNK_BUFFER_SIZE), chunk, delimiter })
    }

    /// Creation sequence number of the underlying chunk.
    #[must_use]
    pub fn seq(&self) -> usize {
        self.chunk.seq
    }

    /// Next record, or `None` when the chunk is exhausted.
    pub fn next_record(&mut self, comparator: &Comparator) -> Result<Option<KeyedRecord>> {
        let path = &self.chunk.path;
        let Some(line) = self
            .lines
            .next_line()
            .with_context(|| format!("Failed to read chunk file: {}", path.display()))?
        else {
            return Ok(None);
        };
        let record = crate::record::Record::new(line.bytes.to_vec(), self.delimiter);
        let keyed = comparator
            .key(record)
            .with_context(|| format!("Corrupt record in chunk file: {}", path.display()))?;
        Ok(Some(keyed))
    }

    /// Delete the chunk file. Failures are logged, never fatal.
    pub fn delete(self) {
        let path = self.chunk.path;
        drop(self.lines);
        remove_chunk_file(&path);
    }
}

/// Best-effort removal of a chunk file.
pub fn remove_chunk_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Deleted chunk file {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to delete chunk file {}: {e}", path.display()),
    }
}

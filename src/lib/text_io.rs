//! Text input/output helpers.
//!
//! - [`open_input`] opens a plain or gzip-compressed file (or `-` for stdin), detecting
//!   compression from the `1f 8b` magic bytes.
//! - [`LineFormat`] describes the delimiter and header/comment prefixes of a record file.
//! - [`RecordSource`] streams a file as header lines and keyed records, skipping and
//!   counting malformed lines.

use anyhow::{Context, Result};
use bstr::ByteSlice;
use flate2::read::MultiGzDecoder;
use log::warn;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::comparator::{Comparator, KeyedRecord};
use crate::errors::RegsortError;
use crate::line_buffer::LineBuffer;
use crate::record::{Delimiter, Record};

/// Buffer size for input and output files.
pub const IO_BUFFER_SIZE: usize = 256 * 1024;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Open an input for streaming. `-` reads stdin; gzip input is decompressed transparently.
pub fn open_input(path: &Path) -> Result<Box<dyn Read + Send>> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(io::stdin()));
    }
    let file =
        File::open(path).with_context(|| format!("Failed to open input: {}", path.display()))?;
    let mut reader = BufReader::with_capacity(IO_BUFFER_SIZE, file);
    let is_gzip = reader.fill_buf()?.starts_with(&GZIP_MAGIC);
    if is_gzip {
        Ok(Box::new(MultiGzDecoder::new(reader)))
    } else {
        Ok(Box::new(reader))
    }
}

/// True if the file starts with the gzip magic bytes.
pub fn is_gzip(path: &Path) -> Result<bool> {
    let mut magic = [0u8; 2];
    let mut file =
        File::open(path).with_context(|| format!("Failed to open input: {}", path.display()))?;
    match file.read_exact(&mut magic) {
        Ok(()) => Ok(magic == GZIP_MAGIC),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Create a buffered output file.
pub fn create_output(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create output: {}", path.display()))?;
    Ok(BufWriter::with_capacity(IO_BUFFER_SIZE, file))
}

/// Write one line followed by `\n`.
#[inline]
pub fn write_line<W: Write>(writer: &mut W, line: &[u8]) -> io::Result<()> {
    writer.write_all(line)?;
    writer.write_all(b"\n")
}

/// Delimiter and header conventions of a record file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineFormat {
    /// Field delimiter.
    pub delimiter: Delimiter,
    /// Lines starting with any of these prefixes are headers/comments.
    pub comment_prefixes: Vec<Vec<u8>>,
}

impl Default for LineFormat {
    /// Tab-delimited, with `#`, `track` and `browser` header lines.
    fn default() -> Self {
        Self {
            delimiter: Delimiter::Tab,
            comment_prefixes: vec![b"#".to_vec(), b"track".to_vec(), b"browser".to_vec()],
        }
    }
}

impl LineFormat {
    /// Use a different delimiter.
    #[must_use]
    pub fn delimiter(mut self, delimiter: Delimiter) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Replace the header prefixes.
    #[must_use]
    pub fn comment_prefixes<I, P>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<[u8]>,
    {
        self.comment_prefixes = prefixes.into_iter().map(|p| p.as_ref().to_vec()).collect();
        self
    }

    /// True if `line` is a header/comment line.
    #[must_use]
    pub fn is_header(&self, line: &[u8]) -> bool {
        self.comment_prefixes.iter().any(|p| !p.is_empty() && line.starts_with(p))
    }

    /// True for lines that carry no data at all.
    #[must_use]
    pub fn is_blank(line: &[u8]) -> bool {
        line.trim().is_empty()
    }

    /// Wrap `line` as a [`Record`] using this format's delimiter.
    #[must_use]
    pub fn record(&self, line: &[u8]) -> Record {
        Record::new(line.to_vec(), self.delimiter)
    }
}

/// An item produced by [`RecordSource`].
#[derive(Debug)]
pub enum SourceItem {
    /// A header/comment line, verbatim.
    Header(Vec<u8>),
    /// A well-formed record with its 1-based line number.
    Record {
        /// The keyed record.
        record: KeyedRecord,
        /// Physical line number.
        line_number: u64,
    },
}

/// Streams a record file as headers and keyed records.
///
/// Malformed lines are skipped and counted; the first one is logged as a warning.
pub struct RecordSource<R> {
    lines: LineBuffer<R>,
    format: LineFormat,
    description: String,
    line_number: u64,
    records: u64,
    headers: u64,
    invalid: u64,
}

impl<R: Read> RecordSource<R> {
    /// Create a source over `reader`. `description` names the input in messages.
    pub fn new(reader: R, format: LineFormat, description: impl Into<String>) -> Self {
        Self {
            lines: LineBuffer::with_capacity(reader, IO_BUFFER_SIZE),
            format,
            description: description.into(),
            line_number: 0,
            records: 0,
            headers: 0,
            invalid: 0,
        }
    }

    /// Next header or valid record, keyed by `comparator`.
    pub fn next_item(&mut self, comparator: &Comparator) -> Result<Option<SourceItem>> {
        loop {
            let Some(line) = self
                .lines
                .next_line()
                .with_context(|| format!("Failed to read {}", self.description))?
            else {
                return Ok(None);
            };
            self.line_number += 1;

            if LineFormat::is_blank(line.bytes) {
                continue;
            }
            if self.format.is_header(line.bytes) {
                self.headers += 1;
                return Ok(Some(SourceItem::Header(line.bytes.to_vec())));
            }

            let record = self.format.record(line.bytes);
            match comparator.key(record) {
                Ok(record) => {
                    self.records += 1;
                    return Ok(Some(SourceItem::Record { record, line_number: self.line_number }));
                }
                Err(e) => {
                    self.invalid += 1;
                    if self.invalid == 1 {
                        warn!(
                            "Skipping malformed line in {}: {}",
                            self.description,
                            e.at_line(self.line_number)
                        );
                    }
                }
            }
        }
    }

    /// Fail with [`RegsortError::NoValidRecords`] if every data line was malformed.
    pub fn ensure_any_valid(&self) -> Result<()> {
        if self.records == 0 && self.invalid > 0 {
            return Err(RegsortError::NoValidRecords {
                path: self.description.clone(),
                invalid: self.invalid,
            }
            .into());
        }
        Ok(())
    }

    /// Physical lines read so far.
    #[must_use]
    pub fn line_number(&self) -> u64 {
        self.line_number
    }

    /// Valid records returned so far.
    #[must_use]
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Header lines returned so far.
    #[must_use]
    pub fn header_lines(&self) -> u64 {
        self.headers
    }

    /// Malformed lines skipped so far.
    #[must_use]
    pub fn invalid_lines(&self) -> u64 {
        self.invalid
    }
}

//! Resumable region cursor over a sorted record file.
//!
//! [`RegionReader`] answers "records on chromosome C overlapping `[start, end)`" by scanning
//! forward from its current position. It keeps exactly one pushed-back record: the first record
//! it read that did not belong to the last query. The next query sees that record first, so a
//! sequence of queries with increasing intervals walks the file once.
//!
//! # Query states
//!
//! | Status | Meaning |
//! |--------|---------|
//! | `Ok` | The interval was answered: the reader stopped at a record past it (or hit the result cap) |
//! | `EndOfChromosome` | C is known but the cursor was already past all of its records |
//! | `EndOfFile` | The file ended while records of C could still follow |
//! | `ChromosomeNotFound` | The scan passed the place where C would be without seeing it |
//!
//! Positioning uses the [`ChromosomeIndex`]: if C's first record lies ahead of the cursor the
//! reader seeks straight to it; otherwise it scans forward, recording every chromosome
//! transition it observes. The reader never moves backwards on its own; use
//! [`RegionReader::reset_to_chromosome`] or [`RegionReader::reset`] to rewind.
//!
//! A chromosome is cached as missing only when the scan covered the place it would occupy:
//! the scan began at the start of the file or after a record ordered before it. A scan that
//! starts at an arbitrary offset can report `ChromosomeNotFound` but leaves the index alone.

use anyhow::{Context, Result};
use bstr::{BString, ByteSlice};
use log::{debug, warn};
use std::cmp::Ordering;
use std::fmt;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use super::index::{ChromosomeIndex, IndexEntry, IndexLookup, IndexView};
use crate::comparator::{Comparator, FieldSpec};
use crate::errors::RegsortError;
use crate::line_buffer::{DEFAULT_CAPACITY, LineBuffer};
use crate::record::{Record, RecordLayout};
use crate::text_io::{LineFormat, is_gzip};

/// Status of a region query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// The interval was fully answered.
    Ok,
    /// The chromosome has already been passed.
    EndOfChromosome,
    /// The end of the file was reached.
    EndOfFile,
    /// The chromosome does not occur in the file.
    ChromosomeNotFound,
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ok => "OK",
            Self::EndOfChromosome => "END_OF_CHROMOSOME",
            Self::EndOfFile => "END_OF_FILE",
            Self::ChromosomeNotFound => "CHROMOSOME_NOT_FOUND",
        })
    }
}

/// How a query ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOutcome {
    /// Final status.
    pub status: QueryStatus,
    /// Chromosome of the record the reader stopped at, if any.
    pub next_chromosome: Option<BString>,
    /// Number of records delivered.
    pub matched: u64,
}

/// What is known about the record just before a position in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Preceding {
    /// Nothing: the position is the start of the file.
    FileStart,
    /// A record on this chromosome.
    Chromosome(BString),
    /// The reader was placed at an arbitrary offset.
    Unknown,
}

/// A record read from the file together with its position.
#[derive(Debug, Clone)]
struct Pending {
    record: Record,
    offset: u64,
    start: u64,
    end: u64,
    preceding: Preceding,
}

/// Saved reader position, including any pushed-back record.
#[derive(Debug, Clone)]
pub struct ReaderCursor {
    /// Byte offset of the next unread line.
    pub offset: u64,
    /// Index of the next unread record.
    pub record_index: u64,
    pushback: Option<Pending>,
    preceding: Preceding,
}

impl ReaderCursor {
    /// The pushed-back record, if any.
    #[must_use]
    pub fn pending(&self) -> Option<&Record> {
        self.pushback.as_ref().map(|p| &p.record)
    }
}

/// Stateful, forward-scanning region reader.
///
/// Not safe for concurrent queries; open one reader per thread and share the index through
/// [`RegionReader::with_index`].
pub struct RegionReader<R> {
    lines: LineBuffer<R>,
    description: String,
    layout: RecordLayout,
    format: LineFormat,
    chromosome_order: FieldSpec,
    index: ChromosomeIndex,
    record_index: u64,
    pushback: Option<Pending>,
    /// Context of the next unread line.
    preceding: Preceding,
    /// Records that cannot be keyed by this comparator are skipped as malformed.
    required_keys: Option<Comparator>,
    records_read: u64,
    invalid: u64,
}

impl RegionReader<File> {
    /// Open an uncompressed sorted file.
    pub fn open(path: &Path) -> Result<Self> {
        if is_gzip(path)? {
            return Err(RegsortError::InvalidFileFormat {
                file_type: "region".to_string(),
                path: path.display().to_string(),
                reason: "region queries need an uncompressed, seekable file".to_string(),
            }
            .into());
        }
        let file = File::open(path)
            .with_context(|| format!("Failed to open region file: {}", path.display()))?;
        Ok(Self::new(file, path.display().to_string()))
    }
}

impl<R: Read + Seek> RegionReader<R> {
    /// Wrap a seekable reader positioned at the start of a BED-ordered file.
    pub fn new(inner: R, description: impl Into<String>) -> Self {
        Self {
            lines: LineBuffer::with_capacity(inner, DEFAULT_CAPACITY),
            description: description.into(),
            layout: RecordLayout::default(),
            format: LineFormat::default(),
            chromosome_order: FieldSpec::text(0),
            index: ChromosomeIndex::new(),
            record_index: 0,
            pushback: None,
            preceding: Preceding::FileStart,
            required_keys: None,
            records_read: 0,
            invalid: 0,
        }
    }

    /// Set which fields hold chromosome, start and end.
    #[must_use]
    pub fn layout(mut self, layout: RecordLayout) -> Self {
        self.layout = layout;
        self.chromosome_order.field = layout.chromosome;
        self
    }

    /// Set delimiter and header prefixes.
    #[must_use]
    pub fn format(mut self, format: LineFormat) -> Self {
        self.format = format;
        self
    }

    /// Order chromosomes the way `comparator` sorted the file.
    ///
    /// Falls back to ascending byte order when the comparator does not sort the chromosome
    /// field.
    #[must_use]
    pub fn comparator(mut self, comparator: &Comparator) -> Self {
        self.chromosome_order = comparator
            .spec_for(self.layout.chromosome)
            .copied()
            .unwrap_or_else(|| FieldSpec::text(self.layout.chromosome));
        self
    }

    /// Skip records that `comparator` cannot key, counting them as malformed.
    #[must_use]
    pub fn require_keys(mut self, comparator: Comparator) -> Self {
        self.required_keys = Some(comparator);
        self
    }

    /// Seed the index with everything `view` already knows.
    #[must_use]
    pub fn with_index(mut self, view: &IndexView) -> Self {
        self.index = view.snapshot();
        self
    }

    /// The chromosome index this reader maintains.
    #[must_use]
    pub fn index(&self) -> &ChromosomeIndex {
        &self.index
    }

    /// Delimiter and header prefixes used to read the file.
    #[must_use]
    pub fn line_format(&self) -> &LineFormat {
        &self.format
    }

    /// Layout used to interpret records.
    #[must_use]
    pub fn record_layout(&self) -> RecordLayout {
        self.layout
    }

    /// Valid records read so far (re-reads after a reset count again).
    #[must_use]
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Malformed lines skipped so far.
    #[must_use]
    pub fn invalid_lines(&self) -> u64 {
        self.invalid
    }

    /// Byte offset of the next record this reader will return.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.pushback.as_ref().map_or(self.lines.offset(), |p| p.offset)
    }

    /// Save the current position.
    #[must_use]
    pub fn cursor(&self) -> ReaderCursor {
        ReaderCursor {
            offset: self.lines.offset(),
            record_index: self.record_index,
            pushback: self.pushback.clone(),
            preceding: self.preceding.clone(),
        }
    }

    /// Return to a position saved with [`RegionReader::cursor`].
    pub fn restore(&mut self, cursor: ReaderCursor) -> Result<()> {
        self.seek(cursor.offset)?;
        self.record_index = cursor.record_index;
        self.pushback = cursor.pushback;
        self.preceding = cursor.preceding;
        Ok(())
    }

    /// Reposition to a byte offset and record index, dropping any pushed-back record.
    pub fn reset(&mut self, offset: u64, record_index: u64) -> Result<()> {
        self.seek(offset)?;
        self.record_index = record_index;
        self.pushback = None;
        self.preceding = if offset == 0 && record_index == 0 {
            Preceding::FileStart
        } else {
            Preceding::Unknown
        };
        Ok(())
    }

    /// Reposition to the first record of `chromosome` if the index knows it (forwards or
    /// backwards); otherwise rewind to the start of the file. Returns true if the chromosome
    /// was found in the index.
    pub fn reset_to_chromosome(&mut self, chromosome: &[u8]) -> Result<bool> {
        match self.index.lookup(chromosome) {
            IndexLookup::Found(entry) => {
                self.jump_to(&entry)?;
                Ok(true)
            }
            IndexLookup::Unknown | IndexLookup::Missing => {
                self.reset(0, 0)?;
                Ok(false)
            }
        }
    }

    /// Collect the records on `chromosome` overlapping `[start, end)`.
    pub fn query(
        &mut self,
        chromosome: &[u8],
        start: u64,
        end: u64,
        limit: Option<usize>,
    ) -> Result<(Vec<Record>, QueryOutcome)> {
        let mut records = Vec::new();
        let outcome = self.query_with(chromosome, start, end, limit, |r| {
            records.push(r);
            Ok(())
        })?;
        Ok((records, outcome))
    }

    /// Deliver the records on `chromosome` overlapping `[start, end)` to `on_match`, in file
    /// order, stopping after `limit` matches.
    ///
    /// If `on_match` fails the error is returned and the reader is left mid-scan; callers that
    /// want to retry should save a [`RegionReader::cursor`] first.
    pub fn query_with<F>(
        &mut self,
        chromosome: &[u8],
        start: u64,
        end: u64,
        limit: Option<usize>,
        mut on_match: F,
    ) -> Result<QueryOutcome>
    where
        F: FnMut(Record) -> Result<()>,
    {
        let known = match self.index.lookup(chromosome) {
            IndexLookup::Missing => {
                return Ok(outcome(QueryStatus::ChromosomeNotFound, None, 0));
            }
            IndexLookup::Found(entry) => {
                if entry.offset > self.position() {
                    debug!("Seeking to {entry}");
                    self.jump_to(&entry)?;
                }
                true
            }
            IndexLookup::Unknown => false,
        };
        let before_scan = self.pushback.as_ref().map_or(&self.preceding, |p| &p.preceding);
        let mut covered = match before_scan {
            Preceding::FileStart => true,
            Preceding::Chromosome(previous) => {
                self.chromosome_order.compare_values(previous, chromosome) == Ordering::Less
            }
            Preceding::Unknown => false,
        };
        let resumed_inside = matches!(
            before_scan,
            Preceding::Chromosome(previous) if previous.as_slice() == chromosome
        );
        let known = known || resumed_inside;

        let mut matched = 0u64;
        let mut seen = false;
        loop {
            let Some(pending) = self.next_record()? else {
                return Ok(outcome(QueryStatus::EndOfFile, None, matched));
            };

            let record_chromosome = pending.record.field(self.layout.chromosome).unwrap_or_default();
            if record_chromosome != chromosome {
                match self.chromosome_order.compare_values(record_chromosome, chromosome) {
                    Ordering::Less => {
                        covered = true;
                        continue;
                    }
                    Ordering::Equal => continue,
                    Ordering::Greater => {}
                }
                let next = Some(BString::from(record_chromosome));
                self.pushback = Some(pending);
                if seen {
                    return Ok(outcome(QueryStatus::Ok, next, matched));
                }
                if known {
                    return Ok(outcome(QueryStatus::EndOfChromosome, next, matched));
                }
                debug!("{} not found in {}", chromosome.as_bstr(), self.description);
                if covered {
                    self.index.mark_missing(chromosome);
                }
                return Ok(outcome(QueryStatus::ChromosomeNotFound, next, matched));
            }

            seen = true;
            if pending.end <= start {
                continue;
            }
            if pending.start >= end {
                self.pushback = Some(pending);
                return Ok(outcome(QueryStatus::Ok, Some(BString::from(chromosome)), matched));
            }
            if limit.is_some_and(|n| matched >= n as u64) {
                self.pushback = Some(pending);
                return Ok(outcome(QueryStatus::Ok, None, matched));
            }
            on_match(pending.record)?;
            matched += 1;
        }
    }

    /// Next valid record: the pushed-back one if present, otherwise the next from the file.
    fn next_record(&mut self) -> Result<Option<Pending>> {
        if let Some(pending) = self.pushback.take() {
            return Ok(Some(pending));
        }
        loop {
            let Some(line) = self
                .lines
                .next_line()
                .with_context(|| format!("Failed to read {}", self.description))?
            else {
                return Ok(None);
            };
            if LineFormat::is_blank(line.bytes) || self.format.is_header(line.bytes) {
                continue;
            }
            let offset = line.offset;
            let record = self.format.record(line.bytes);
            let located = self.layout.locate(&record).and_then(|locus| {
                if let Some(comparator) = &self.required_keys {
                    comparator.validate(&record)?;
                }
                Ok(locus)
            });
            let (start, end) = match located {
                Ok(locus) => (locus.start, locus.end),
                Err(e) => {
                    self.invalid += 1;
                    if self.invalid == 1 {
                        warn!(
                            "Skipping malformed record in {} at byte {offset}: {e}",
                            self.description
                        );
                    }
                    continue;
                }
            };

            let record_index = self.record_index;
            self.record_index += 1;
            self.records_read += 1;
            let preceding = self.observe_chromosome(&record, offset, record_index);
            return Ok(Some(Pending { record, offset, start, end, preceding }));
        }
    }

    /// Index chromosome transitions as they are read in file order. Returns what preceded
    /// the record.
    fn observe_chromosome(&mut self, record: &Record, offset: u64, record_index: u64) -> Preceding {
        let name = record.field(self.layout.chromosome).unwrap_or_default();
        let transition = match &self.preceding {
            Preceding::FileStart => true,
            Preceding::Chromosome(previous) => previous.as_slice() != name,
            Preceding::Unknown => false,
        };
        if transition && self.index.record(name, offset, record_index) {
            debug!("Indexed {} at byte {offset} (record {record_index})", name.as_bstr());
        }
        let preceding = self.preceding.clone();
        if !matches!(&self.preceding, Preceding::Chromosome(c) if c.as_slice() == name) {
            self.preceding = Preceding::Chromosome(BString::from(name));
        }
        preceding
    }

    fn jump_to(&mut self, entry: &IndexEntry) -> Result<()> {
        self.seek(entry.offset)?;
        self.record_index = entry.record_index;
        self.pushback = None;
        self.preceding = Preceding::Unknown;
        Ok(())
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        self.lines
            .seek_to(offset)
            .with_context(|| format!("Failed to seek to byte {offset} in {}", self.description))
    }
}

fn outcome(status: QueryStatus, next_chromosome: Option<BString>, matched: u64) -> QueryOutcome {
    QueryOutcome { status, next_chromosome, matched }
}

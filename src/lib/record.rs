//! Line records with lazily computed field boundaries.
//!
//! A [`Record`] owns the raw bytes of one line. Field boundaries are computed the first time
//! any field is accessed and cached for the lifetime of the record; numeric fields are only
//! parsed when a caller asks for them. [`RecordLayout`] names which fields hold the
//! chromosome, start and end of an interval and turns a record into a [`Locus`].

use bstr::ByteSlice;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::errors::RegsortError;

/// Field separator for record lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delimiter {
    /// A single tab; adjacent tabs delimit empty fields.
    #[default]
    Tab,
    /// Runs of spaces and/or tabs; leading and trailing whitespace is ignored.
    Whitespace,
    /// A single arbitrary byte.
    Byte(u8),
}

impl Delimiter {
    fn split(self, line: &[u8]) -> Vec<(usize, usize)> {
        match self {
            Self::Tab => split_on(line, b'\t'),
            Self::Byte(b) => split_on(line, b),
            Self::Whitespace => {
                let mut fields = Vec::new();
                let mut i = 0;
                while i < line.len() {
                    while i < line.len() && is_blank(line[i]) {
                        i += 1;
                    }
                    let start = i;
                    while i < line.len() && !is_blank(line[i]) {
                        i += 1;
                    }
                    if start < i {
                        fields.push((start, i));
                    }
                }
                fields
            }
        }
    }
}

fn is_blank(b: u8) -> bool {
    b == b' ' || b == b'\t'
}

fn split_on(line: &[u8], sep: u8) -> Vec<(usize, usize)> {
    let mut fields = Vec::with_capacity(12);
    let mut start = 0;
    for (i, &b) in line.iter().enumerate() {
        if b == sep {
            fields.push((start, i));
            start = i + 1;
        }
    }
    fields.push((start, line.len()));
    fields
}

impl FromStr for Delimiter {
    type Err = RegsortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tab" | "\\t" | "\t" => Ok(Self::Tab),
            "whitespace" | "ws" => Ok(Self::Whitespace),
            other if other.len() == 1 => Ok(Self::Byte(other.as_bytes()[0])),
            other => Err(RegsortError::InvalidParameter {
                parameter: "delimiter".to_string(),
                reason: format!("expected 'tab', 'whitespace' or a single byte, got '{other}'"),
            }),
        }
    }
}

/// One line of a record file.
///
/// Cloning copies the bytes and any cached field boundaries.
#[derive(Clone)]
pub struct Record {
    line: Box<[u8]>,
    delimiter: Delimiter,
    fields: OnceLock<Box<[(usize, usize)]>>,
}

impl Record {
    /// Create a record from one line (without its terminator).
    pub fn new(line: impl Into<Box<[u8]>>, delimiter: Delimiter) -> Self {
        Self { line: line.into(), delimiter, fields: OnceLock::new() }
    }

    /// Raw line bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.line
    }

    /// Consume the record, returning its bytes.
    #[must_use]
    pub fn into_bytes(self) -> Box<[u8]> {
        self.line
    }

    /// Delimiter used to split this record.
    #[must_use]
    pub fn delimiter(&self) -> Delimiter {
        self.delimiter
    }

    /// Length of the line in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.line.len()
    }

    /// True for an empty line.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.line.is_empty()
    }

    fn bounds(&self) -> &[(usize, usize)] {
        self.fields.get_or_init(|| self.delimiter.split(&self.line).into_boxed_slice())
    }

    /// Number of fields on the line.
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.bounds().len()
    }

    /// Bytes of field `index`, if present.
    #[must_use]
    pub fn field(&self, index: usize) -> Option<&[u8]> {
        self.bounds().get(index).map(|&(s, e)| &self.line[s..e])
    }

    /// Field `index` as UTF-8 text, if present and valid.
    #[must_use]
    pub fn field_str(&self, index: usize) -> Option<&str> {
        self.field(index).and_then(|f| std::str::from_utf8(f).ok())
    }

    /// Parse field `index`; `None` if it is missing or does not parse.
    #[must_use]
    pub fn parse_field<T: FromStr>(&self, index: usize) -> Option<T> {
        self.field_str(index).and_then(|s| s.trim().parse().ok())
    }

    /// Approximate heap footprint, used for chunk memory accounting.
    #[must_use]
    pub fn heap_size(&self) -> usize {
        let fields = self.fields.get().map_or(0, |f| f.len() * size_of::<(usize, usize)>());
        size_of::<Self>() + self.line.len() + fields
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Record").field(&self.line.as_bstr()).finish()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.line.as_bstr())
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.line == other.line
    }
}

impl Eq for Record {}

/// Interval coordinates of a record, borrowed from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Locus<'a> {
    /// Chromosome (contig) name.
    pub chromosome: &'a [u8],
    /// 0-based start, inclusive.
    pub start: u64,
    /// End, exclusive.
    pub end: u64,
}

impl Locus<'_> {
    /// Half-open interval intersection with `[start, end)`.
    #[must_use]
    pub fn overlaps(&self, start: u64, end: u64) -> bool {
        self.start < end && self.end > start
    }

    /// True if the locus ends at or before `start`.
    #[must_use]
    pub fn is_before(&self, start: u64) -> bool {
        self.end <= start
    }

    /// True if the locus begins at or after `end`.
    #[must_use]
    pub fn is_after(&self, end: u64) -> bool {
        self.start >= end
    }
}

/// Which fields of a line hold the chromosome and coordinates, and how many fields a valid
/// record must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayout {
    /// Field index of the chromosome name.
    pub chromosome: usize,
    /// Field index of the 0-based start.
    pub start: usize,
    /// Field index of the exclusive end.
    pub end: usize,
    /// Minimum number of fields for a valid record.
    pub min_fields: usize,
}

impl Default for RecordLayout {
    /// BED-style layout: chromosome, start, end in the first three fields.
    fn default() -> Self {
        Self::new(0, 1, 2)
    }
}

impl RecordLayout {
    /// Layout with the given field indices; the minimum field count covers all three.
    #[must_use]
    pub fn new(chromosome: usize, start: usize, end: usize) -> Self {
        let min_fields = chromosome.max(start).max(end) + 1;
        Self { chromosome, start, end, min_fields }
    }

    /// Require at least `min_fields` fields (never fewer than the coordinate fields need).
    #[must_use]
    pub fn with_min_fields(mut self, min_fields: usize) -> Self {
        self.min_fields = min_fields.max(self.chromosome.max(self.start).max(self.end) + 1);
        self
    }

    /// Extract the interval of `record`.
    pub fn locate<'a>(&self, record: &'a Record) -> Result<Locus<'a>, RegsortError> {
        let found = record.field_count();
        if found < self.min_fields {
            return Err(RegsortError::malformed(found, self.min_fields, "too few fields"));
        }
        let chromosome = record.field(self.chromosome).unwrap_or_default();
        let start = record
            .parse_field::<u64>(self.start)
            .ok_or_else(|| RegsortError::malformed(found, self.min_fields, "non-numeric start"))?;
        let end = record
            .parse_field::<u64>(self.end)
            .ok_or_else(|| RegsortError::malformed(found, self.min_fields, "non-numeric end"))?;
        if end < start {
            return Err(RegsortError::malformed(found, self.min_fields, "end before start"));
        }
        Ok(Locus { chromosome, start, end })
    }
}

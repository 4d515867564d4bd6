//! Region queries against sorted record files.
//!
//! - [`ChromosomeIndex`]: append-only map from chromosome to its first byte offset
//! - [`RegionReader`]: resumable cursor producing records that overlap an interval
//! - [`RegionQueryEngine`]: runs queries in memory, falling back to a disk-backed sort when
//!   results outgrow the in-memory budget
//! - [`RetryPolicy`]: backoff for transient I/O errors during the fallback

pub mod index;
pub mod query;
pub mod reader;
pub mod retry;

use bstr::BString;
use std::fmt;
use std::str::FromStr;

use crate::errors::RegsortError;

pub use index::{ChromosomeIndex, IndexEntry, IndexLookup, IndexView};
pub use query::{DiskRecords, QueryResult, RegionQueryEngine, RegionRecords};
pub use reader::{QueryOutcome, QueryStatus, ReaderCursor, RegionReader};
pub use retry::{RetryPolicy, is_transient};

/// A half-open interval `[start, end)` on one chromosome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    /// Chromosome name.
    pub chromosome: BString,
    /// 0-based start, inclusive.
    pub start: u64,
    /// End, exclusive.
    pub end: u64,
}

impl Region {
    /// Create a region.
    pub fn new(chromosome: impl Into<BString>, start: u64, end: u64) -> Self {
        Self { chromosome: chromosome.into(), start, end }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.chromosome, self.start, self.end)
    }
}

impl FromStr for Region {
    type Err = RegsortError;

    /// Parse `chrom:start-end` (commas in numbers are ignored) or a bare `chrom` for the
    /// whole chromosome.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| RegsortError::InvalidParameter {
            parameter: "region".to_string(),
            reason: format!("{reason}: '{s}'"),
        };
        let Some((chromosome, range)) = s.rsplit_once(':') else {
            if s.is_empty() {
                return Err(invalid("empty region"));
            }
            return Ok(Self::new(s, 0, u64::MAX));
        };
        if chromosome.is_empty() {
            return Err(invalid("missing chromosome"));
        }
        let (start, end) = range.split_once('-').ok_or_else(|| invalid("expected chrom:start-end"))?;
        let parse = |n: &str| n.replace(',', "").trim().parse::<u64>();
        let start = parse(start).map_err(|_| invalid("start is not a number"))?;
        let end = parse(end).map_err(|_| invalid("end is not a number"))?;
        if end < start {
            return Err(invalid("end is before start"));
        }
        Ok(Self::new(chromosome, start, end))
    }
}

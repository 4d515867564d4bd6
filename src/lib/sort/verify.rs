//! Sortedness verification.
//!
//! A single streaming pass that reports whether a file already satisfies a comparator's order,
//! so callers can skip an unnecessary sort (or know they need one).

use anyhow::Result;
use log::info;
use std::cmp::Ordering;
use std::io::Read;
use std::path::Path;

use crate::comparator::{Comparator, KeyedRecord};
use crate::text_io::{LineFormat, RecordSource, SourceItem, open_input};

/// Outcome of a sortedness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applicability {
    /// Every record is in order; `records` valid records were read.
    Sorted {
        /// Number of record lines read (headers and malformed lines excluded).
        records: u64,
    },
    /// The record at 1-based physical line `line_number` sorts before its predecessor.
    Unsorted {
        /// First offending line.
        line_number: u64,
    },
}

impl Applicability {
    /// The record count when sorted, or the negated offending line number.
    ///
    /// ```
    /// use regsort_lib::sort::Applicability;
    ///
    /// assert_eq!(Applicability::Sorted { records: 12 }.as_signed(), 12);
    /// assert_eq!(Applicability::Unsorted { line_number: 500 }.as_signed(), -500);
    /// ```
    #[must_use]
    pub fn as_signed(&self) -> i64 {
        match *self {
            Self::Sorted { records } => i64::try_from(records).unwrap_or(i64::MAX),
            Self::Unsorted { line_number } => -i64::try_from(line_number).unwrap_or(i64::MAX),
        }
    }

    /// True if the input is in order.
    #[must_use]
    pub fn is_sorted(&self) -> bool {
        matches!(self, Self::Sorted { .. })
    }
}

/// Check whether `path` (plain, gzip, or `-` for stdin) is sorted by `comparator`.
pub fn check_sorted(path: &Path, comparator: &Comparator, format: &LineFormat) -> Result<Applicability> {
    let reader = open_input(path)?;
    check_reader(reader, &path.display().to_string(), comparator, format)
}

/// Check whether the lines of `reader` are sorted by `comparator`.
///
/// Header lines, blank lines and malformed lines are skipped; each remaining record is
/// compared with the previous one.
pub fn check_reader<R: Read>(
    reader: R,
    description: &str,
    comparator: &Comparator,
    format: &LineFormat,
) -> Result<Applicability> {
    let mut source = RecordSource::new(reader, format.clone(), description);
    let mut previous: Option<KeyedRecord> = None;

    while let Some(item) = source.next_item(comparator)? {
        let SourceItem::Record { record, line_number } = item else {
            continue;
        };
        if let Some(prev) = &previous {
            if comparator.compare_keyed(prev, &record) == Ordering::Greater {
                info!("{description} is not sorted: line {line_number} is out of order");
                return Ok(Applicability::Unsorted { line_number });
            }
        }
        previous = Some(record);
    }

    let records = source.records();
    if source.invalid_lines() > 0 {
        info!("{description}: skipped {} malformed lines", source.invalid_lines());
    }
    info!("{description} is sorted ({records} records)");
    Ok(Applicability::Sorted { records })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::fmt::Write as _;

    fn check(text: &str, comparator: &Comparator) -> Applicability {
        check_reader(Cursor::new(text.to_string()), "test", comparator, &LineFormat::default())
            .unwrap()
    }

    #[test]
    fn test_sorted_counts_records_only() {
        let text = "#header\nchr1\t1\t2\n\nchr1\t1\t2\nchr1\tbad\nchr2\t0\t1\n";
        let result = check(text, &Comparator::bed());
        assert_eq!(result, Applicability::Sorted { records: 3 });
        assert_eq!(result.as_signed(), 3);
        assert!(result.is_sorted());
    }

    #[test]
    fn test_reports_physical_line_of_first_violation() {
        let text = "track x\nchr1\t5\t6\nchr1\t10\t11\nchr1\t7\t8\nchr1\t1\t2\n";
        let result = check(text, &Comparator::bed());
        assert_eq!(result, Applicability::Unsorted { line_number: 4 });
        assert_eq!(result.as_signed(), -4);
    }

    #[test]
    fn test_out_of_order_at_line_500() {
        let mut text = String::new();
        for i in 0..1000u64 {
            let start = if i == 499 { 0 } else { i * 10 };
            writeln!(text, "chr1\t{start}\t{}", start + 5).unwrap();
        }
        assert_eq!(check(&text, &Comparator::bed()).as_signed(), -500);
    }

    #[test]
    fn test_descending_comparator() {
        let cmp: Comparator = "1nr".parse().unwrap();
        assert!(check("a\t9\nb\t3\nc\t3\n", &cmp).is_sorted());
        assert!(!check("a\t3\nb\t9\n", &cmp).is_sorted());
    }

    #[test]
    fn test_empty_input_is_sorted() {
        assert_eq!(check("", &Comparator::bed()), Applicability::Sorted { records: 0 });
    }
}

//! Custom error types for regsort operations.
//!
//! Most operations return [`anyhow::Result`]; the variants here carry the domain conditions
//! a caller may want to inspect with `downcast_ref::<RegsortError>()`.

use thiserror::Error;

/// Error type for regsort operations
#[derive(Error, Debug)]
pub enum RegsortError {
    /// Invalid parameter value provided
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// The parameter name
        parameter: String,
        /// Explanation of why it's invalid
        reason: String,
    },

    /// File format error
    #[error("Invalid {file_type} file '{path}': {reason}")]
    InvalidFileFormat {
        /// Type of file (e.g., "BED", "sorted input")
        file_type: String,
        /// Path to the file
        path: String,
        /// Explanation of the problem
        reason: String,
    },

    /// A line does not carry the fields a layout or comparator needs.
    #[error("Malformed record at line {line_number}: {reason} (found {found} fields, need {required})")]
    MalformedRecord {
        /// 1-based line number, or 0 when unknown
        line_number: u64,
        /// Number of fields present on the line
        found: usize,
        /// Minimum number of fields required
        required: usize,
        /// What was wrong with the line
        reason: String,
    },

    /// Every data line of an input was malformed.
    #[error("No valid records in '{path}': all {invalid} data lines were malformed")]
    NoValidRecords {
        /// Path (or description) of the input
        path: String,
        /// Number of malformed lines
        invalid: u64,
    },

    /// A transient I/O failure persisted past the retry budget.
    #[error(
        "{operation} failed for region {chromosome}:{start}-{end} after {attempts} attempts: {source}"
    )]
    ExhaustedRetries {
        /// The operation that was retried (e.g. "create fallback temp file")
        operation: String,
        /// Chromosome of the region being queried
        chromosome: String,
        /// Query start (0-based, inclusive)
        start: u64,
        /// Query end (exclusive)
        end: u64,
        /// Number of attempts made, including the first
        attempts: u32,
        /// The last error observed
        #[source]
        source: std::io::Error,
    },
}

impl RegsortError {
    /// Convenience constructor for [`RegsortError::MalformedRecord`].
    #[must_use]
    pub fn malformed(found: usize, required: usize, reason: impl Into<String>) -> Self {
        Self::MalformedRecord { line_number: 0, found, required, reason: reason.into() }
    }

    /// Attach a line number to a [`RegsortError::MalformedRecord`]; other variants pass through.
    #[must_use]
    pub fn at_line(self, line: u64) -> Self {
        match self {
            Self::MalformedRecord { found, required, reason, .. } => {
                Self::MalformedRecord { line_number: line, found, required, reason }
            }
            other => other,
        }
    }
}

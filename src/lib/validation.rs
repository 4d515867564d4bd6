//! Input validation utilities
//!
//! Common checks for command-line parameters and file paths, reporting failures through
//! [`RegsortError`] so messages stay consistent across commands.

use crate::errors::RegsortError;
use std::fmt::Display;
use std::path::Path;

type Result<T> = std::result::Result<T, RegsortError>;

/// True for the `-` path that stands for stdin or stdout.
#[must_use]
pub fn is_std_stream(path: &Path) -> bool {
    path.as_os_str() == "-"
}

/// Validate that a file exists
///
/// # Arguments
/// * `path` - Path to validate
/// * `description` - Human-readable description of the file (e.g., "Input file")
///
/// # Errors
/// Returns an error if the file does not exist
///
/// # Example
/// ```
/// use regsort_lib::validation::validate_file_exists;
///
/// let result = validate_file_exists("/nonexistent/intervals.bed", "Input file");
/// assert!(result.is_err());
/// ```
pub fn validate_file_exists<P: AsRef<Path>>(path: P, description: &str) -> Result<()> {
    let path_ref = path.as_ref();
    if !path_ref.exists() {
        return Err(RegsortError::InvalidFileFormat {
            file_type: description.to_string(),
            path: path_ref.display().to_string(),
            reason: "File does not exist".to_string(),
        });
    }
    Ok(())
}

/// Validate that a directory exists and is a directory.
///
/// # Errors
/// Returns an error if the path is missing or is not a directory
pub fn validate_dir_exists<P: AsRef<Path>>(path: P, description: &str) -> Result<()> {
    let path_ref = path.as_ref();
    if !path_ref.is_dir() {
        return Err(RegsortError::InvalidParameter {
            parameter: description.to_string(),
            reason: format!("'{}' is not a directory", path_ref.display()),
        });
    }
    Ok(())
}

/// Validate that a value is positive (> 0)
///
/// # Example
/// ```
/// use regsort_lib::validation::validate_positive;
///
/// validate_positive(4, "threads").unwrap();
/// assert!(validate_positive(0, "threads").is_err());
/// ```
#[allow(clippy::needless_pass_by_value)]
pub fn validate_positive<T: Ord + Display + Default>(value: T, name: &str) -> Result<()> {
    if value <= T::default() {
        return Err(RegsortError::InvalidParameter {
            parameter: name.to_string(),
            reason: format!("Must be positive (> 0), got: {value}"),
        });
    }
    Ok(())
}

/// Parse a memory size such as `512M`, `1G`, `64K` or a plain byte count.
///
/// Suffixes are case-insensitive and binary (`1K` is 1024 bytes). Fractional values
/// (`1.5G`) are accepted.
///
/// # Example
/// ```
/// use regsort_lib::validation::parse_memory;
///
/// assert_eq!(parse_memory("64K").unwrap(), 65_536);
/// assert_eq!(parse_memory("1g").unwrap(), 1 << 30);
/// assert!(parse_memory("lots").is_err());
/// ```
pub fn parse_memory(s: &str) -> Result<usize> {
    let invalid = |reason: String| RegsortError::InvalidParameter {
        parameter: "max-memory".to_string(),
        reason,
    };
    let s = s.trim().to_uppercase();
    if s.is_empty() {
        return Err(invalid("Empty memory specification".to_string()));
    }

    let (num_str, multiplier) = match s.as_bytes()[s.len() - 1] {
        b'G' => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        b'M' => (&s[..s.len() - 1], 1024 * 1024),
        b'K' => (&s[..s.len() - 1], 1024),
        _ => (s.as_str(), 1),
    };

    let num: f64 = num_str.parse().map_err(|_| invalid(format!("Invalid number: {num_str}")))?;
    if !num.is_finite() || num <= 0.0 {
        return Err(invalid(format!("Memory size must be positive, got: {s}")));
    }
    let bytes = (num * f64::from(multiplier)) as usize;
    validate_positive(bytes, "max-memory")?;
    Ok(bytes)
}

/// Adapter for clap `value_parser`.
///
/// # Errors
/// Returns the validation message as a string
pub fn parse_memory_arg(s: &str) -> std::result::Result<usize, String> {
    parse_memory(s).map_err(|e| e.to_string())
}

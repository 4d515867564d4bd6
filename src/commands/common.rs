//! Common CLI options shared across commands.
//!
//! This module provides shared argument structures that can be composed into
//! command structs using `#[command(flatten)]`.

use std::fs::File;
use std::io::{self, BufWriter, StdoutLock, Write};
use std::path::Path;

use anyhow::Result;
use clap::Args;

use regsort_lib::comparator::Comparator;
use regsort_lib::record::Delimiter;
use regsort_lib::text_io::{IO_BUFFER_SIZE, LineFormat, create_output};
use regsort_lib::validation::{is_std_stream, validate_file_exists};

/// Layout of the input records and the order they are (or will be) sorted in.
#[derive(Debug, Clone, Args)]
pub struct FormatOptions {
    /// Sort fields: comma-separated `FIELD[n][r]` entries, optionally ending with `line`.
    ///
    /// Field indices are 0-based; `n` compares numerically and `r` sorts descending.
    /// A trailing `line` breaks ties by comparing whole lines. The default is BED order.
    #[arg(long = "fields", default_value = "0,1n,2n", value_parser = parse_fields)]
    pub fields: Comparator,

    /// Field delimiter: `tab`, `whitespace`, or a single character.
    #[arg(long = "delimiter", default_value = "tab", value_parser = parse_delimiter)]
    pub delimiter: Delimiter,

    /// Prefixes marking header/comment lines. May be repeated.
    #[arg(
        long = "comment-prefix",
        num_args = 1..,
        default_values = ["#", "track", "browser"]
    )]
    pub comment_prefixes: Vec<String>,
}

impl FormatOptions {
    /// The line format described by these options.
    pub fn line_format(&self) -> LineFormat {
        LineFormat::default()
            .delimiter(self.delimiter)
            .comment_prefixes(self.comment_prefixes.iter().map(String::as_bytes))
    }
}

fn parse_fields(s: &str) -> Result<Comparator, String> {
    s.parse().map_err(|e: regsort_lib::RegsortError| e.to_string())
}

fn parse_delimiter(s: &str) -> Result<Delimiter, String> {
    s.parse().map_err(|e: regsort_lib::RegsortError| e.to_string())
}

/// Validates that an input exists, unless it is `-` (stdin).
pub fn validate_input(path: &Path, description: &str) -> Result<()> {
    if !is_std_stream(path) {
        validate_file_exists(path, description)?;
    }
    Ok(())
}

/// Output destination: a file or stdout.
pub enum Output {
    /// Buffered file.
    File(BufWriter<File>),
    /// Buffered stdout.
    Stdout(BufWriter<StdoutLock<'static>>),
}

impl Output {
    /// Open `path` for writing; `-` writes to stdout.
    pub fn create(path: &Path) -> Result<Self> {
        if is_std_stream(path) {
            Ok(Self::Stdout(BufWriter::with_capacity(IO_BUFFER_SIZE, io::stdout().lock())))
        } else {
            Ok(Self::File(create_output(path)?))
        }
    }
}

impl Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::File(w) => w.write(buf),
            Self::Stdout(w) => w.write(buf),
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            Self::File(w) => w.write_all(buf),
            Self::Stdout(w) => w.write_all(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::File(w) => w.flush(),
            Self::Stdout(w) => w.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Debug, Parser)]
    struct Harness {
        #[command(flatten)]
        format: FormatOptions,
    }

    #[test]
    fn test_format_defaults() {
        let args = Harness::try_parse_from(["test"]).unwrap();
        assert_eq!(args.format.fields.to_string(), "0,1n,2n");
        assert_eq!(args.format.line_format(), LineFormat::default());
    }

    #[test]
    fn test_format_overrides() {
        let args = Harness::try_parse_from([
            "test",
            "--fields",
            "3,1nr,line",
            "--delimiter",
            ",",
            "--comment-prefix",
            "@",
        ])
        .unwrap();
        assert!(args.format.fields.whole_line_tiebreak());
        let format = args.format.line_format();
        assert_eq!(format.delimiter, Delimiter::Byte(b','));
        assert!(format.is_header(b"@HD"));
        assert!(!format.is_header(b"#x"));
    }

    #[test]
    fn test_bad_fields_rejected() {
        assert!(Harness::try_parse_from(["test", "--fields", "x"]).is_err());
    }
}

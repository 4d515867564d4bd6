//! Sort delimited record files of any size.
//!
//! Input is read in bounded-memory batches that a worker pool sorts and spills to temporary
//! files, then merged with a k-way heap merge. An input that fits in one batch is sorted in
//! memory without touching disk. The sort is stable: records with equal keys keep their input
//! order.

use anyhow::Result;
use clap::Parser;
use log::info;
use std::path::PathBuf;

use regsort_lib::logging::{OperationTimer, format_bytes, log_sort_summary};
use regsort_lib::sort::{DEFAULT_MEMORY_LIMIT, ExternalSorter, MemoryPressure};
use regsort_lib::validation::{parse_memory_arg, validate_dir_exists, validate_positive};

use crate::commands::command::Command;
use crate::commands::common::{FormatOptions, validate_input};

/// Sort a record file.
#[derive(Debug, Parser)]
#[command(
    name = "sort",
    about = "\x1b[38;5;72m[SORT]\x1b[0m           \x1b[36mSort a BED-like file by one or more fields\x1b[0m",
    long_about = r#"
Sort a delimited record file using an external merge sort.

Files larger than --max-memory are split into sorted chunks in --tmp-dir and merged.
Header lines (see --comment-prefix) are written first, in input order, unless
--skip-headers is given. Malformed lines (too few fields, non-numeric numeric fields)
are skipped and counted; the sort fails only if every data line is malformed.

FIELD SPECS:

  --fields takes comma-separated FIELD[n][r] entries: a 0-based field index, `n` to
  compare numerically, `r` to sort descending. A final `line` entry breaks ties by
  comparing whole lines.

EXAMPLES:

  # BED order (chromosome, start, end)
  regsort sort -i intervals.bed.gz -o sorted.bed

  # Order by score (field 4) descending, then by name
  regsort sort -i peaks.bed -o by_score.bed --fields 4nr,3

  # Large input with more memory and threads
  regsort sort -i big.bed -o sorted.bed --max-memory 2G --threads 8 --tmp-dir /scratch
"#
)]
pub struct Sort {
    /// Input file, plain or gzip-compressed (`-` for stdin).
    #[arg(short = 'i', long = "input", default_value = "-")]
    pub input: PathBuf,

    /// Output file (`-` for stdout).
    #[arg(short = 'o', long = "output", default_value = "-")]
    pub output: PathBuf,

    /// Record layout and sort order.
    #[command(flatten)]
    pub format: FormatOptions,

    /// Maximum memory per in-memory chunk.
    ///
    /// Accepts values like "512M", "1G", "64K". Each worker thread may hold one chunk
    /// while the reader fills the next.
    #[arg(short = 'm', long = "max-memory", default_value = "512M", value_parser = parse_memory_arg)]
    pub max_memory: usize,

    /// Number of threads sorting and spilling chunks.
    #[arg(short = '@', short_alias = 't', long = "threads", default_value = "1")]
    pub threads: usize,

    /// Temporary directory for intermediate files.
    ///
    /// If not specified, uses the system default temp directory.
    #[arg(short = 'T', long = "tmp-dir")]
    pub tmp_dir: Option<PathBuf>,

    /// Drop header lines instead of copying them to the output.
    #[arg(long = "skip-headers", default_value = "false")]
    pub skip_headers: bool,

    /// Compression level for temporary chunk files (0-9, 0 disables compression).
    #[arg(long = "temp-compression", default_value = "1", value_parser = clap::value_parser!(u32).range(0..=9))]
    pub temp_compression: u32,

    /// Also cut a chunk early when free system memory drops below this fraction of total.
    #[arg(long = "min-free-memory", value_parser = parse_fraction)]
    pub min_free_memory: Option<f64>,
}

fn parse_fraction(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|_| format!("Invalid fraction: {s}"))?;
    if (0.0..1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("Fraction must be in [0, 1), got: {value}"))
    }
}

impl Command for Sort {
    fn execute(&self, command_line: &str) -> Result<()> {
        validate_input(&self.input, "Input file")?;
        validate_positive(self.threads, "threads")?;
        if let Some(dir) = &self.tmp_dir {
            validate_dir_exists(dir, "tmp-dir")?;
        }

        info!("Starting Sort");
        info!("Command line: {command_line}");
        info!("Input: {}", self.input.display());
        info!("Output: {}", self.output.display());
        if self.max_memory != DEFAULT_MEMORY_LIMIT {
            info!("Chunk memory: {} (custom)", format_bytes(self.max_memory as u64));
        }

        let timer = OperationTimer::new("Sorting records");
        let stats = self.sorter().sort(&self.input, &self.output)?;
        log_sort_summary(&stats);
        timer.log_completion(stats.output_records);
        Ok(())
    }
}

impl Sort {
    fn sorter(&self) -> ExternalSorter {
        let format = self.format.line_format();
        let pressure = self
            .min_free_memory
            .map(|min_free_fraction| MemoryPressure { min_free_fraction, ..MemoryPressure::default() });
        let mut sorter = ExternalSorter::new(self.format.fields.clone())
            .memory_limit(self.max_memory)
            .threads(self.threads)
            .delimiter(format.delimiter)
            .comment_prefixes(format.comment_prefixes)
            .keep_headers(!self.skip_headers)
            .temp_compression(self.temp_compression)
            .memory_pressure(pressure);
        if let Some(dir) = &self.tmp_dir {
            sorter = sorter.temp_dir(dir.clone());
        }
        sorter
    }
}

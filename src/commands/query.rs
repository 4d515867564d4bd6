//! Extract records overlapping genomic regions from a sorted file.
//!
//! Queries run against a forward-scanning reader that indexes chromosome starts as it goes,
//! so later queries on an already-seen chromosome seek straight to it. Results are collected
//! in memory and fall back to a disk-backed sort when they outgrow `--max-memory`.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use regsort_lib::logging::{OperationTimer, format_count};
use regsort_lib::record::RecordLayout;
use regsort_lib::region::{Region, RegionQueryEngine, RegionReader, RetryPolicy};
use regsort_lib::region::query::DEFAULT_RAM_BUDGET;
use regsort_lib::region::retry::{DEFAULT_BACKOFF_FACTOR, DEFAULT_MAX_RETRIES};
use regsort_lib::text_io::write_line;
use regsort_lib::validation::{parse_memory_arg, validate_dir_exists, validate_file_exists};

use crate::commands::command::Command;
use crate::commands::common::{FormatOptions, Output};

/// Query regions.
#[derive(Debug, Parser)]
#[command(
    name = "query",
    about = "\x1b[38;5;166m[QUERY]\x1b[0m          \x1b[36mExtract records overlapping regions from a sorted file\x1b[0m",
    long_about = r#"
Extract the records overlapping one or more regions from a sorted, uncompressed file.

Regions are half-open, 0-based intervals written chrom:start-end (commas allowed in
numbers); a bare chromosome name selects the whole chromosome. Each region is answered
independently and its records are written in --fields order. A status line per region
(OK, END_OF_CHROMOSOME, END_OF_FILE or CHROMOSOME_NOT_FOUND) is logged.

The file must be sorted with the same --fields (see `regsort check`).

EXAMPLES:

  regsort query -i sorted.bed --region chr1:100-200 --region chr2
  regsort query -i sorted.bed --region chr1:1,000,000-2,000,000 --limit 100
"#
)]
pub struct Query {
    /// Sorted, uncompressed input file.
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,

    /// Output file (`-` for stdout).
    #[arg(short = 'o', long = "output", default_value = "-")]
    pub output: PathBuf,

    /// Region to extract, `chrom:start-end` or `chrom`. May be repeated.
    #[arg(short = 'r', long = "region", required = true, value_parser = parse_region)]
    pub regions: Vec<Region>,

    /// Maximum number of records returned per region.
    #[arg(long = "limit")]
    pub limit: Option<usize>,

    /// Record layout and the order the file is sorted in.
    #[command(flatten)]
    pub format: FormatOptions,

    /// Field holding the chromosome (0-based).
    #[arg(long = "chrom-field", default_value = "0")]
    pub chrom_field: usize,

    /// Field holding the 0-based start (0-based field index).
    #[arg(long = "start-field", default_value = "1")]
    pub start_field: usize,

    /// Field holding the exclusive end (0-based field index).
    #[arg(long = "end-field", default_value = "2")]
    pub end_field: usize,

    /// In-memory budget for one region's results before falling back to disk.
    #[arg(short = 'm', long = "max-memory", default_value = "256M", value_parser = parse_memory_arg)]
    pub max_memory: usize,

    /// Temporary directory for the disk fallback.
    #[arg(short = 'T', long = "tmp-dir")]
    pub tmp_dir: Option<PathBuf>,

    /// Retries for transient I/O errors during the disk fallback.
    #[arg(long = "max-retries", default_value_t = DEFAULT_MAX_RETRIES)]
    pub max_retries: u32,

    /// Delay before the first retry, in milliseconds; each retry waits longer.
    #[arg(long = "retry-base-ms", default_value = "1000")]
    pub retry_base_ms: u64,
}

fn parse_region(s: &str) -> Result<Region, String> {
    s.parse().map_err(|e: regsort_lib::RegsortError| e.to_string())
}

impl Command for Query {
    fn execute(&self, command_line: &str) -> Result<()> {
        validate_file_exists(&self.input, "Input file")?;
        if let Some(dir) = &self.tmp_dir {
            validate_dir_exists(dir, "tmp-dir")?;
        }

        info!("Starting Query");
        info!("Command line: {command_line}");
        info!("Input: {}", self.input.display());
        if self.max_memory != DEFAULT_RAM_BUDGET {
            info!("Result memory budget: {} bytes", self.max_memory);
        }

        let timer = OperationTimer::new("Querying regions");
        let mut engine = self.engine()?;
        let mut out = Output::create(&self.output)?;
        let mut total = 0u64;

        for region in &self.regions {
            engine.reset_to_chromosome(region.chromosome.as_slice())?;
            let result = engine.query(region, self.limit)?;
            let on_disk = result.records.is_on_disk();
            let mut written = 0u64;
            for record in result.records {
                write_line(&mut out, record?.as_bytes()).context("Failed to write records")?;
                written += 1;
            }
            total += written;
            let hint = result.next_chromosome.map(|c| format!(", next {c}")).unwrap_or_default();
            info!(
                "{region}: {} records, {}{hint}{}",
                format_count(written),
                result.status,
                if on_disk { " (disk)" } else { "" }
            );
        }
        out.flush().context("Failed to flush output")?;

        let invalid = engine.reader().invalid_lines();
        if invalid > 0 {
            info!("Skipped {} malformed lines", format_count(invalid));
        }
        timer.log_completion(total);
        Ok(())
    }
}

impl Query {
    fn engine(&self) -> Result<RegionQueryEngine<std::fs::File>> {
        let comparator = &self.format.fields;
        let layout = RecordLayout::new(self.chrom_field, self.start_field, self.end_field);
        let reader = RegionReader::open(&self.input)?
            .layout(layout)
            .format(self.format.line_format())
            .comparator(comparator);
        let retry = RetryPolicy::new(self.max_retries, Duration::from_millis(self.retry_base_ms))
            .factor(DEFAULT_BACKOFF_FACTOR);
        let mut engine = RegionQueryEngine::new(reader)
            .pairing(comparator.clone())
            .ram_budget(self.max_memory)
            .retry(retry);
        if let Some(dir) = &self.tmp_dir {
            engine = engine.temp_dir(dir.clone());
        }
        Ok(engine)
    }
}

//! Check whether a record file is already sorted.

use anyhow::{Result, bail};
use clap::Parser;
use log::info;
use std::path::PathBuf;

use regsort_lib::sort::{Applicability, check_sorted};

use crate::commands::command::Command;
use crate::commands::common::{FormatOptions, validate_input};

/// Check sort order.
#[derive(Debug, Parser)]
#[command(
    name = "check",
    about = "\x1b[38;5;72m[SORT]\x1b[0m           \x1b[36mCheck whether a file is sorted by the given fields\x1b[0m",
    long_about = r#"
Check whether a delimited record file is sorted, without writing anything.

Prints a single integer to stdout: the number of records when the file is sorted, or
the negated 1-based line number of the first out-of-order record when it is not.
Header and malformed lines are skipped. Exits non-zero when the file is unsorted.

EXAMPLES:

  regsort check -i sorted.bed
  regsort check -i peaks.bed.gz --fields 0,1n
"#
)]
pub struct Check {
    /// Input file, plain or gzip-compressed (`-` for stdin).
    #[arg(short = 'i', long = "input", default_value = "-")]
    pub input: PathBuf,

    /// Record layout and expected sort order.
    #[command(flatten)]
    pub format: FormatOptions,
}

impl Command for Check {
    fn execute(&self, _command_line: &str) -> Result<()> {
        validate_input(&self.input, "Input file")?;
        info!("Checking sort order of {} by {}", self.input.display(), self.format.fields);

        let result =
            check_sorted(&self.input, &self.format.fields, &self.format.line_format())?;
        println!("{}", result.as_signed());

        if let Applicability::Unsorted { line_number } = result {
            bail!("{} is not sorted: line {line_number} is out of order", self.input.display());
        }
        Ok(())
    }
}

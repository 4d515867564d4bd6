//! Deterministic interval fixtures.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

/// One BED-like interval with a name column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interval {
    pub chromosome: String,
    pub start: u64,
    pub end: u64,
    pub name: String,
}

impl Interval {
    pub fn new(chromosome: &str, start: u64, end: u64, name: &str) -> Self {
        Self { chromosome: chromosome.to_string(), start, end, name: name.to_string() }
    }

    /// Tab-delimited line without terminator.
    pub fn line(&self) -> String {
        format!("{}\t{}\t{}\t{}", self.chromosome, self.start, self.end, self.name)
    }

    /// True if the interval overlaps half-open `[start, end)` on `chromosome`.
    pub fn overlaps(&self, chromosome: &str, start: u64, end: u64) -> bool {
        self.chromosome == chromosome && self.start < end && self.end > start
    }
}

/// `n` scattered intervals over `chromosomes` chromosomes, generated by a fixed
/// multiplicative hash so fixtures are reproducible without a random number generator.
pub fn scattered_intervals(n: u64, chromosomes: u64) -> Vec<Interval> {
    (0..n)
        .map(|i| {
            let h = i.wrapping_mul(2_654_435_761) % 1_000_003;
            let chromosome = format!("chr{}", h % chromosomes + 1);
            let start = (h * 7) % 50_000;
            let end = start + 1 + h % 300;
            Interval::new(&chromosome, start, end, &format!("r{i}"))
        })
        .collect()
}

/// The intervals in BED order (chromosome text, start, end), stable.
pub fn bed_sorted(intervals: &[Interval]) -> Vec<Interval> {
    let mut sorted = intervals.to_vec();
    sorted.sort_by(|a, b| {
        a.chromosome.cmp(&b.chromosome).then(a.start.cmp(&b.start)).then(a.end.cmp(&b.end))
    });
    sorted
}

/// Lines of the intervals joined with trailing newlines.
pub fn to_text(intervals: &[Interval]) -> String {
    intervals.iter().map(|i| i.line() + "\n").collect()
}

/// Write `content` to `dir/name`.
pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).expect("Failed to write fixture");
    path
}

/// Non-empty lines of a file.
pub fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .expect("Failed to read output")
        .lines()
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

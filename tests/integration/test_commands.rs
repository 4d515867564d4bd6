//! Integration tests for the regsort binary.

use std::process::Command;
use tempfile::TempDir;

use crate::helpers::{
    Interval, assert_bed_order, bed_sorted, read_lines, scattered_intervals, to_text, write_file,
};

fn regsort() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_regsort"));
    command.env("RUST_LOG", "warn");
    command
}

#[test]
fn test_sort_command_spills_and_orders() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let intervals = scattered_intervals(3_000, 6);
    let input = write_file(temp_dir.path(), "in.bed", &format!("#chrom\tstart\tend\tname\n{}", to_text(&intervals)));
    let output = temp_dir.path().join("out.bed");

    let status = regsort()
        .args([
            "sort",
            "-i",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--max-memory",
            "32K",
            "--threads",
            "3",
            "--tmp-dir",
            temp_dir.path().to_str().unwrap(),
        ])
        .status()
        .expect("Failed to run sort command");
    assert!(status.success(), "sort command failed");

    let lines = read_lines(&output);
    assert_eq!(lines[0], "#chrom\tstart\tend\tname");
    assert_bed_order(&lines[1..]);
    let expected: Vec<String> = bed_sorted(&intervals).iter().map(Interval::line).collect();
    assert_eq!(&lines[1..], expected.as_slice());
}

#[test]
fn test_sort_command_skip_headers_to_stdout() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = write_file(temp_dir.path(), "in.bed", "browser x\nchr2\t1\t2\nchr1\t5\t9\n");

    let out = regsort()
        .args(["sort", "-i", input.to_str().unwrap(), "--skip-headers"])
        .output()
        .expect("Failed to run sort command");
    assert!(out.status.success());
    assert_eq!(String::from_utf8(out.stdout).unwrap(), "chr1\t5\t9\nchr2\t1\t2\n");
}

#[test]
fn test_check_command_reports_sorted_and_unsorted() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let sorted = write_file(temp_dir.path(), "s.bed", "chr1\t1\t2\nchr1\t3\t4\nchr2\t0\t1\n");
    let unsorted = write_file(temp_dir.path(), "u.bed", "chr1\t1\t2\nchr1\t3\t4\nchr1\t0\t1\n");

    let out = regsort()
        .args(["check", "-i", sorted.to_str().unwrap()])
        .output()
        .expect("Failed to run check command");
    assert!(out.status.success());
    assert_eq!(String::from_utf8(out.stdout).unwrap().trim(), "3");

    let out = regsort()
        .args(["check", "-i", unsorted.to_str().unwrap()])
        .output()
        .expect("Failed to run check command");
    assert!(!out.status.success());
    assert_eq!(String::from_utf8(out.stdout).unwrap().trim(), "-3");
}

#[test]
fn test_query_command_multiple_regions() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = write_file(
        temp_dir.path(),
        "s.bed",
        "chr1\t50\t150\ta\nchr1\t180\t250\tb\nchr2\t10\t20\tc\nchr2\t30\t40\td\n",
    );
    let output = temp_dir.path().join("hits.bed");

    let status = regsort()
        .args([
            "query",
            "-i",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--region",
            "chr2:0-35",
            "--region",
            "chr1:100-200",
            "--region",
            "chrX",
        ])
        .status()
        .expect("Failed to run query command");
    assert!(status.success());
    assert_eq!(
        read_lines(&output),
        vec!["chr2\t10\t20\tc", "chr2\t30\t40\td", "chr1\t50\t150\ta", "chr1\t180\t250\tb"]
    );
}

#[test]
fn test_query_command_disk_fallback_matches() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let mut intervals = bed_sorted(&scattered_intervals(1_000, 2));
    intervals.retain(|i| i.chromosome == "chr1");
    let input = write_file(temp_dir.path(), "s.bed", &to_text(&intervals));

    let run = |budget: &str| {
        let out = regsort()
            .args(["query", "-i", input.to_str().unwrap(), "-r", "chr1:0-20000", "-m", budget])
            .output()
            .expect("Failed to run query command");
        assert!(out.status.success());
        String::from_utf8(out.stdout).unwrap()
    };
    let in_memory = run("256M");
    assert!(!in_memory.is_empty());
    assert_eq!(in_memory, run("1"));
}

#[test]
fn test_missing_input_fails() {
    let out = regsort()
        .args(["sort", "-i", "/nonexistent/in.bed", "-o", "/nonexistent/out.bed"])
        .output()
        .expect("Failed to run sort command");
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("does not exist"));
}

#[test]
fn test_invalid_memory_rejected() {
    let out = regsort()
        .args(["sort", "-i", "-", "--max-memory", "lots"])
        .output()
        .expect("Failed to run sort command");
    assert!(!out.status.success());
}

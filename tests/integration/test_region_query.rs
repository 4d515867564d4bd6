//! Region queries against files produced by the external sorter.

use bstr::BString;
use regsort_lib::comparator::Comparator;
use regsort_lib::region::{
    ChromosomeIndex, QueryStatus, Region, RegionQueryEngine, RegionReader,
};
use regsort_lib::sort::ExternalSorter;
use rstest::rstest;
use std::fs::File;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::helpers::{Interval, bed_sorted, scattered_intervals, to_text, write_file};

const REGIONS: &[(&str, u64, u64)] = &[
    ("chr1", 0, 1_000),
    ("chr1", 20_000, 21_500),
    ("chr3", 49_000, 60_000),
    ("chr5", 0, 50_000),
    ("chr2", 12_345, 12_346),
    ("chr4", 10_000, 10_200),
];

fn sorted_fixture(dir: &Path, intervals: &[Interval], memory_limit: usize, threads: usize) -> PathBuf {
    let input = write_file(dir, "unsorted.bed", &to_text(intervals));
    let output = dir.join(format!("sorted_{memory_limit}_{threads}.bed"));
    ExternalSorter::new(Comparator::bed())
        .memory_limit(memory_limit)
        .threads(threads)
        .sort(&input, &output)
        .unwrap();
    output
}

fn expected(intervals: &[Interval], chromosome: &str, start: u64, end: u64) -> Vec<String> {
    bed_sorted(intervals)
        .iter()
        .filter(|i| i.overlaps(chromosome, start, end))
        .map(Interval::line)
        .collect()
}

fn run(engine: &mut RegionQueryEngine<File>, region: &Region) -> (Vec<String>, QueryStatus) {
    engine.reset_to_chromosome(region.chromosome.as_slice()).unwrap();
    let result = engine.query(region, None).unwrap();
    let status = result.status;
    let lines = result.records.into_vec().unwrap().iter().map(ToString::to_string).collect();
    (lines, status)
}

#[test]
fn test_overlap_scenario_returns_ok_and_excludes_other_chromosome() {
    let dir = TempDir::new().unwrap();
    let path = write_file(dir.path(), "s.bed", "chr1\t50\t150\nchr1\t180\t250\nchr2\t10\t20\n");
    let mut engine = RegionQueryEngine::open(&path).unwrap();

    let result = engine.query(&Region::new("chr1", 100, 200), None).unwrap();
    assert_eq!(result.status, QueryStatus::Ok);
    assert_eq!(result.matched, 2);
    let lines: Vec<String> =
        result.records.into_vec().unwrap().iter().map(ToString::to_string).collect();
    assert_eq!(lines, vec!["chr1\t50\t150", "chr1\t180\t250"]);
}

#[rstest]
#[case::in_memory(1 << 30, 1)]
#[case::tiny_chunks(512, 1)]
#[case::tiny_chunks_parallel(512, 4)]
#[case::medium_chunks_parallel(16 * 1024, 3)]
fn test_query_results_independent_of_sort_configuration(
    #[case] memory_limit: usize,
    #[case] threads: usize,
) {
    let dir = TempDir::new().unwrap();
    let intervals = scattered_intervals(1_500, 5);
    let path = sorted_fixture(dir.path(), &intervals, memory_limit, threads);
    let mut engine = RegionQueryEngine::open(&path).unwrap();

    for &(chromosome, start, end) in REGIONS {
        let region = Region::new(chromosome, start, end);
        let (lines, status) = run(&mut engine, &region);
        assert_eq!(lines, expected(&intervals, chromosome, start, end), "region {region}");
        assert_ne!(status, QueryStatus::ChromosomeNotFound);
    }
}

#[test]
fn test_repeated_queries_after_reset_are_identical() {
    let dir = TempDir::new().unwrap();
    let intervals = scattered_intervals(800, 3);
    let path = sorted_fixture(dir.path(), &intervals, 2_048, 2);
    let mut engine = RegionQueryEngine::open(&path).unwrap();

    let region = Region::new("chr2", 5_000, 30_000);
    let first = run(&mut engine, &region);
    // Move the cursor elsewhere before repeating.
    run(&mut engine, &Region::new("chr3", 0, 100));
    let second = run(&mut engine, &region);
    assert_eq!(first, second);
    assert!(!first.0.is_empty());
}

#[test]
fn test_missing_chromosome_is_reported_and_cached() {
    let dir = TempDir::new().unwrap();
    let intervals = scattered_intervals(300, 2);
    let path = sorted_fixture(dir.path(), &intervals, 1 << 20, 1);
    let mut engine = RegionQueryEngine::open(&path).unwrap();

    let (lines, status) = run(&mut engine, &Region::new("chr1a", 0, 10));
    assert!(lines.is_empty());
    assert_eq!(status, QueryStatus::ChromosomeNotFound);

    let (lines, status) = run(&mut engine, &Region::new("chr1a", 0, 10));
    assert!(lines.is_empty());
    assert_eq!(status, QueryStatus::ChromosomeNotFound);

    let (lines, _) = run(&mut engine, &Region::new("chr2", 0, 50_000));
    assert_eq!(lines, expected(&intervals, "chr2", 0, 50_000));
}

#[test]
fn test_last_chromosome_ends_at_end_of_file() {
    let dir = TempDir::new().unwrap();
    let path = write_file(dir.path(), "s.bed", "chr1\t1\t2\nchr2\t10\t20\nchr2\t30\t40\n");
    let mut engine = RegionQueryEngine::open(&path).unwrap();
    let result = engine.query(&Region::new("chr2", 0, 1_000), None).unwrap();
    assert_eq!(result.status, QueryStatus::EndOfFile);
    assert_eq!(result.matched, 2);
}

#[test]
fn test_sequential_scan_with_hints() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        dir.path(),
        "s.bed",
        "chr1\t10\t20\nchr1\t30\t40\nchr1\t50\t60\nchr2\t5\t6\n",
    );
    let mut engine = RegionQueryEngine::open(&path).unwrap();

    let first = engine.query(&Region::new("chr1", 0, 25), None).unwrap();
    assert_eq!((first.status, first.matched), (QueryStatus::Ok, 1));
    assert_eq!(first.next_chromosome, Some(BString::from("chr1")));

    // Resumes from the pushed-back record without a reset.
    let second = engine.query(&Region::new("chr1", 25, 100), None).unwrap();
    assert_eq!((second.status, second.matched), (QueryStatus::Ok, 2));
    assert_eq!(second.next_chromosome, Some(BString::from("chr2")));

    // chr1 is now behind the cursor.
    let third = engine.query(&Region::new("chr1", 0, 100), None).unwrap();
    assert_eq!(third.status, QueryStatus::EndOfChromosome);
    assert_eq!(third.matched, 0);
}

#[test]
fn test_limit_pushes_back_and_resumes() {
    let dir = TempDir::new().unwrap();
    let text: String = (0..10).map(|i| format!("chr1\t{}\t{}\n", i * 10, i * 10 + 5)).collect();
    let path = write_file(dir.path(), "s.bed", &text);
    let mut engine = RegionQueryEngine::open(&path).unwrap();
    let region = Region::new("chr1", 0, 1_000);

    let mut all = Vec::new();
    loop {
        let result = engine.query(&region, Some(3)).unwrap();
        let batch = result.records.into_vec().unwrap();
        all.extend(batch.iter().map(ToString::to_string));
        if result.status != QueryStatus::Ok || result.next_chromosome.is_some() || batch.is_empty()
        {
            break;
        }
    }
    assert_eq!(all.len(), 10);
    assert_eq!(all[9], "chr1\t90\t95");
}

#[test]
fn test_independent_readers_share_an_index_view() {
    let dir = TempDir::new().unwrap();
    let intervals = scattered_intervals(1_000, 4);
    let path = sorted_fixture(dir.path(), &intervals, 4_096, 2);

    // Build the index with one full pass.
    let mut primary = RegionReader::open(&path).unwrap();
    primary.query(b"chr9", 0, 1, None).unwrap();
    let index: &ChromosomeIndex = primary.index();
    assert_eq!(index.len(), 4);
    let view = index.view();

    std::thread::scope(|scope| {
        for chromosome in ["chr1", "chr2", "chr3", "chr4"] {
            let view = view.clone();
            let path = path.clone();
            let intervals = &intervals;
            scope.spawn(move || {
                let reader = RegionReader::open(&path).unwrap().with_index(&view);
                let mut engine = RegionQueryEngine::new(reader);
                let region = Region::new(chromosome, 1_000, 9_000);
                let result = engine.query(&region, None).unwrap();
                let lines: Vec<String> =
                    result.records.into_vec().unwrap().iter().map(ToString::to_string).collect();
                assert_eq!(lines, expected(intervals, chromosome, 1_000, 9_000));
            });
        }
    });
}

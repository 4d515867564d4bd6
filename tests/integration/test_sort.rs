//! End-to-end sort properties: ordering, completeness, stability, and agreement with the
//! sortedness checker.

use proptest::prelude::*;
use regsort_lib::comparator::Comparator;
use regsort_lib::record::{Delimiter, Record};
use regsort_lib::sort::{Applicability, ExternalSorter, check_reader, check_sorted};
use regsort_lib::text_io::LineFormat;
use std::io::Cursor;
use tempfile::TempDir;

use crate::helpers::{
    Interval, assert_bed_order, assert_same_bag, bed_sorted, read_lines, scattered_intervals,
    to_text, write_file,
};

fn sort_to_lines(sorter: &ExternalSorter, text: &str) -> (Vec<String>, usize) {
    let mut out = Vec::new();
    let stats = sorter.sort_reader(Cursor::new(text.to_string()), "test", &mut out).unwrap();
    let lines = String::from_utf8(out).unwrap().lines().map(str::to_string).collect();
    (lines, stats.chunks_written)
}

fn arb_interval() -> impl Strategy<Value = Interval> {
    (1u8..6, 0u64..2_000, 0u64..200, 0u32..1_000).prop_map(|(c, start, len, name)| {
        Interval::new(&format!("chr{c}"), start, start + len, &format!("n{name}"))
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_sort_is_ordered_permutation(
        intervals in prop::collection::vec(arb_interval(), 0..120),
        memory_limit in prop::sample::select(vec![1usize, 400, 4_000, 1 << 20]),
        threads in 1usize..4,
    ) {
        let input: Vec<String> = intervals.iter().map(Interval::line).collect();
        let sorter = ExternalSorter::new(Comparator::bed())
            .memory_limit(memory_limit)
            .threads(threads);
        let (output, _) = sort_to_lines(&sorter, &to_text(&intervals));

        assert_bed_order(&output);
        assert_same_bag(&output, &input);
    }

    #[test]
    fn prop_sorted_output_is_applicable(
        intervals in prop::collection::vec(arb_interval(), 1..120),
        memory_limit in prop::sample::select(vec![1usize, 1 << 20]),
    ) {
        let sorter = ExternalSorter::new(Comparator::bed()).memory_limit(memory_limit);
        let mut out = Vec::new();
        sorter.sort_reader(Cursor::new(to_text(&intervals)), "test", &mut out).unwrap();

        let result =
            check_reader(Cursor::new(out), "sorted", &Comparator::bed(), &LineFormat::default())
                .unwrap();
        prop_assert_eq!(result.as_signed(), intervals.len() as i64);
    }
}

#[test]
fn test_equal_keys_keep_input_order_across_chunks() {
    // Every record shares one key; only the name column differs.
    let intervals: Vec<Interval> =
        (0..40).map(|i| Interval::new("chr1", 100, 200, &format!("{i:02}"))).collect();
    for threads in [1, 3] {
        let sorter = ExternalSorter::new(Comparator::bed()).memory_limit(1).threads(threads);
        let (output, chunks) = sort_to_lines(&sorter, &to_text(&intervals));
        assert_eq!(chunks, 40);
        let expected: Vec<String> = intervals.iter().map(Interval::line).collect();
        assert_eq!(output, expected);
    }
}

#[test]
fn test_chromosome_run_straddling_chunk_boundaries_stays_contiguous() {
    // Fixed-width lines so every record has the same in-memory size.
    let input = [
        Interval::new("chr1", 300, 310, "a"),
        Interval::new("chr2", 500, 510, "b"),
        Interval::new("chr2", 100, 110, "c"),
        Interval::new("chr2", 300, 310, "d"),
        Interval::new("chr2", 200, 210, "e"),
        Interval::new("chr3", 100, 110, "f"),
        Interval::new("chr1", 100, 110, "g"),
        Interval::new("chr2", 400, 410, "h"),
        Interval::new("chr3", 900, 910, "i"),
    ];
    let record_size = Comparator::bed()
        .key(Record::new(input[0].line().into_bytes(), Delimiter::Tab))
        .unwrap()
        .heap_size();

    let sorter = ExternalSorter::new(Comparator::bed()).memory_limit(3 * record_size).threads(2);
    let (output, chunks) = sort_to_lines(&sorter, &to_text(&input));
    assert_eq!(chunks, 3);

    let chr2: Vec<usize> =
        output.iter().enumerate().filter(|(_, l)| l.starts_with("chr2\t")).map(|(i, _)| i).collect();
    assert_eq!(chr2, (2..7).collect::<Vec<_>>(), "chr2 records must be contiguous");
    let names: Vec<&str> = output.iter().map(|l| l.rsplit('\t').next().unwrap()).collect();
    assert_eq!(names, vec!["g", "a", "c", "e", "d", "h", "b", "f", "i"]);
}

#[test]
fn test_large_file_sort_then_check() {
    let dir = TempDir::new().unwrap();
    let intervals = scattered_intervals(5_000, 12);
    let input = write_file(dir.path(), "in.bed", &format!("track name=x\n{}", to_text(&intervals)));
    let output = dir.path().join("out.bed");

    let stats = ExternalSorter::new(Comparator::bed())
        .memory_limit(64 * 1024)
        .threads(4)
        .temp_dir(dir.path().join("tmp"))
        .sort(&input, &output)
        .unwrap();
    assert!(stats.chunks_written > 1);
    assert_eq!(stats.output_records, 5_000);
    assert_eq!(stats.header_lines, 1);

    let lines = read_lines(&output);
    assert_eq!(lines[0], "track name=x");
    let expected: Vec<String> = bed_sorted(&intervals).iter().map(Interval::line).collect();
    assert_eq!(&lines[1..], expected.as_slice());

    let result = check_sorted(&output, &Comparator::bed(), &LineFormat::default()).unwrap();
    assert_eq!(result, Applicability::Sorted { records: 5_000 });
    let unsorted = check_sorted(&input, &Comparator::bed(), &LineFormat::default()).unwrap();
    assert!(!unsorted.is_sorted());
}

#[test]
fn test_out_of_order_line_500_reports_negative_position() {
    let mut lines: Vec<String> =
        (0..999u64).map(|i| format!("chr1\t{}\t{}", i * 10, i * 10 + 5)).collect();
    // Line 500 (1-based) moves back before its predecessor.
    lines[499] = "chr1\t0\t1".to_string();
    let text = lines.join("\n") + "\n";

    let result =
        check_reader(Cursor::new(text), "test", &Comparator::bed(), &LineFormat::default()).unwrap();
    assert_eq!(result.as_signed(), -500);
}

#[test]
fn test_descending_numeric_fields_with_tiebreak() {
    let text = "a\t5\nb\t10\nc\t5\nd\t7\n";
    let comparator: Comparator = "1nr,line".parse().unwrap();
    let sorter = ExternalSorter::new(comparator).memory_limit(1).threads(2);
    let (output, _) = sort_to_lines(&sorter, text);
    assert_eq!(output, vec!["b\t10", "d\t7", "a\t5", "c\t5"]);
}

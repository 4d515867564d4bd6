//! Custom assertion helpers for integration tests.

#![allow(dead_code)]

/// Asserts that tab-delimited lines are in BED order (chromosome text, start, end).
///
/// # Panics
///
/// Panics at the first pair of lines out of order.
pub fn assert_bed_order(lines: &[String]) {
    let key = |line: &String| {
        let mut fields = line.split('\t');
        let chromosome = fields.next().unwrap_or_default().to_string();
        let start: u64 = fields.next().and_then(|f| f.parse().ok()).expect("numeric start");
        let end: u64 = fields.next().and_then(|f| f.parse().ok()).expect("numeric end");
        (chromosome, start, end)
    };
    for (i, pair) in lines.windows(2).enumerate() {
        assert!(
            key(&pair[0]) <= key(&pair[1]),
            "lines {} and {} out of order: {:?} > {:?}",
            i + 1,
            i + 2,
            pair[0],
            pair[1]
        );
    }
}

/// Asserts that two line collections hold the same lines with the same multiplicities.
///
/// # Panics
///
/// Panics if a line was lost or duplicated.
pub fn assert_same_bag(actual: &[String], expected: &[String]) {
    let mut a = actual.to_vec();
    let mut e = expected.to_vec();
    a.sort();
    e.sort();
    assert_eq!(a.len(), e.len(), "record count differs");
    assert_eq!(a, e, "records lost or duplicated");
}

//! Hierarchical field comparators.
//!
//! A [`Comparator`] is an ordered list of [`FieldSpec`]s plus an optional whole-line
//! tie-break. Field specs are evaluated in order and the first non-equal result wins.
//!
//! Comparison happens on [`KeyedRecord`]s: [`Comparator::key`] validates a record once
//! (enough fields, numeric fields parse) and caches parsed numbers next to it, so the hot
//! sorting and merging paths compare infallibly. A record that cannot be keyed is reported as
//! [`RegsortError::MalformedRecord`] and never silently compared as equal.
//!
//! # Text form
//!
//! Comparators parse from a comma-separated list of `FIELD[n][r]` entries (0-based field
//! index, `n` for numeric, `r` for descending), optionally ending with `line` to enable the
//! whole-line tie-break:
//!
//! ```
//! use regsort_lib::comparator::Comparator;
//!
//! let cmp: Comparator = "0,1n,2n,line".parse().unwrap();
//! assert_eq!(cmp.fields().len(), 3);
//! assert!(cmp.whole_line_tiebreak());
//! assert_eq!(cmp.to_string(), "0,1n,2n,line");
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::errors::RegsortError;
use crate::record::Record;

/// How a field's bytes are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Byte-wise comparison.
    Lexicographic,
    /// Parsed as a floating point number and compared numerically.
    Numeric,
}

/// Sort direction of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

/// One level of a [`Comparator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// 0-based field index.
    pub field: usize,
    /// Lexicographic or numeric.
    pub kind: FieldKind,
    /// Ascending or descending.
    pub direction: Direction,
}

impl FieldSpec {
    /// Ascending lexicographic spec.
    #[must_use]
    pub fn text(field: usize) -> Self {
        Self { field, kind: FieldKind::Lexicographic, direction: Direction::Ascending }
    }

    /// Ascending numeric spec.
    #[must_use]
    pub fn numeric(field: usize) -> Self {
        Self { field, kind: FieldKind::Numeric, direction: Direction::Ascending }
    }

    /// The same spec in descending order.
    #[must_use]
    pub fn descending(mut self) -> Self {
        self.direction = Direction::Descending;
        self
    }

    fn orient(self, ordering: Ordering) -> Ordering {
        match self.direction {
            Direction::Ascending => ordering,
            Direction::Descending => ordering.reverse(),
        }
    }

    /// Compare two raw field values under this spec.
    ///
    /// Numeric specs fall back to byte order when either side does not parse.
    #[must_use]
    pub fn compare_values(&self, a: &[u8], b: &[u8]) -> Ordering {
        let ordering = match self.kind {
            FieldKind::Lexicographic => a.cmp(b),
            FieldKind::Numeric => match (parse_number(a), parse_number(b)) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                _ => a.cmp(b),
            },
        };
        self.orient(ordering)
    }
}

fn parse_number(bytes: &[u8]) -> Option<f64> {
    let value: f64 = std::str::from_utf8(bytes).ok()?.trim().parse().ok()?;
    (!value.is_nan()).then_some(value)
}

impl FromStr for FieldSpec {
    type Err = RegsortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let digits_end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        let invalid = |reason: String| RegsortError::InvalidParameter {
            parameter: "field spec".to_string(),
            reason,
        };
        let field: usize = s[..digits_end]
            .parse()
            .map_err(|_| invalid(format!("'{s}' does not start with a field index")))?;

        let mut spec = Self::text(field);
        for flag in s[digits_end..].chars() {
            match flag {
                'n' => spec.kind = FieldKind::Numeric,
                'r' => spec.direction = Direction::Descending,
                other => return Err(invalid(format!("unknown flag '{other}' in '{s}'"))),
            }
        }
        Ok(spec)
    }
}

impl fmt::Display for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.field)?;
        if self.kind == FieldKind::Numeric {
            f.write_str("n")?;
        }
        if self.direction == Direction::Descending {
            f.write_str("r")?;
        }
        Ok(())
    }
}

/// A cached comparison value for one [`FieldSpec`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyValue {
    /// Compared using the record's field bytes.
    Text,
    /// Pre-parsed numeric value.
    Number(f64),
}

/// A record together with the key values its comparator needs.
#[derive(Debug, Clone)]
pub struct KeyedRecord {
    key: Box<[KeyValue]>,
    record: Record,
}

impl KeyedRecord {
    /// The underlying record.
    #[must_use]
    pub fn record(&self) -> &Record {
        &self.record
    }

    /// Drop the key and return the record.
    #[must_use]
    pub fn into_record(self) -> Record {
        self.record
    }

    /// Raw line bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.record.as_bytes()
    }

    /// Approximate heap footprint of record plus key.
    #[must_use]
    pub fn heap_size(&self) -> usize {
        self.record.heap_size() + self.key.len() * size_of::<KeyValue>()
    }
}

/// Ordered field specs plus an optional whole-line tie-break.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparator {
    fields: Vec<FieldSpec>,
    whole_line_tiebreak: bool,
}

impl Comparator {
    /// Comparator over the given specs, without a tie-break.
    #[must_use]
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields, whole_line_tiebreak: false }
    }

    /// BED order: chromosome (text), start (numeric), end (numeric).
    #[must_use]
    pub fn bed() -> Self {
        Self::new(vec![FieldSpec::text(0), FieldSpec::numeric(1), FieldSpec::numeric(2)])
    }

    /// Enable or disable the whole-line tie-break.
    #[must_use]
    pub fn with_whole_line_tiebreak(mut self, enabled: bool) -> Self {
        self.whole_line_tiebreak = enabled;
        self
    }

    /// The field specs, in evaluation order.
    #[must_use]
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Whether equal keys are ordered by the whole line.
    #[must_use]
    pub fn whole_line_tiebreak(&self) -> bool {
        self.whole_line_tiebreak
    }

    /// Minimum number of fields a record needs to be keyed.
    #[must_use]
    pub fn required_fields(&self) -> usize {
        self.fields.iter().map(|s| s.field + 1).max().unwrap_or(0)
    }

    /// The first spec that compares `field`, if any.
    #[must_use]
    pub fn spec_for(&self, field: usize) -> Option<&FieldSpec> {
        self.fields.iter().find(|s| s.field == field)
    }

    /// Validate `record` and attach its key.
    pub fn key(&self, record: Record) -> Result<KeyedRecord, RegsortError> {
        let key = self.key_values(&record)?;
        Ok(KeyedRecord { key, record })
    }

    /// Check that `record` can be keyed without building the key.
    pub fn validate(&self, record: &Record) -> Result<(), RegsortError> {
        let found = record.field_count();
        let required = self.required_fields();
        if found < required {
            return Err(RegsortError::malformed(found, required, "too few fields"));
        }
        let unparsable = self.fields.iter().find(|spec| {
            spec.kind == FieldKind::Numeric
                && record.field(spec.field).and_then(parse_number).is_none()
        });
        match unparsable {
            Some(spec) => Err(RegsortError::malformed(
                found,
                required,
                format!("field {} is not numeric", spec.field),
            )),
            None => Ok(()),
        }
    }

    fn key_values(&self, record: &Record) -> Result<Box<[KeyValue]>, RegsortError> {
        let found = record.field_count();
        let required = self.required_fields();
        if found < required {
            return Err(RegsortError::malformed(found, required, "too few fields"));
        }
        self.fields
            .iter()
            .map(|spec| match spec.kind {
                FieldKind::Lexicographic => Ok(KeyValue::Text),
                FieldKind::Numeric => record
                    .field(spec.field)
                    .and_then(parse_number)
                    .map(KeyValue::Number)
                    .ok_or_else(|| {
                        RegsortError::malformed(
                            found,
                            required,
                            format!("field {} is not numeric", spec.field),
                        )
                    }),
            })
            .collect()
    }

    /// Compare two keyed records. Both must have been keyed by this comparator.
    #[must_use]
    pub fn compare_keyed(&self, a: &KeyedRecord, b: &KeyedRecord) -> Ordering {
        for (i, spec) in self.fields.iter().enumerate() {
            let ordering = match (a.key.get(i), b.key.get(i)) {
                (Some(KeyValue::Number(x)), Some(KeyValue::Number(y))) => x.total_cmp(y),
                _ => {
                    let x = a.record.field(spec.field).unwrap_or_default();
                    let y = b.record.field(spec.field).unwrap_or_default();
                    x.cmp(y)
                }
            };
            let ordering = spec.orient(ordering);
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        if self.whole_line_tiebreak {
            a.as_bytes().cmp(b.as_bytes())
        } else {
            Ordering::Equal
        }
    }

    /// Compare two unkeyed records, failing if either is malformed.
    pub fn compare(&self, a: &Record, b: &Record) -> Result<Ordering, RegsortError> {
        let a = KeyedRecord { key: self.key_values(a)?, record: a.clone() };
        let b = KeyedRecord { key: self.key_values(b)?, record: b.clone() };
        Ok(self.compare_keyed(&a, &b))
    }
}

impl Default for Comparator {
    fn default() -> Self {
        Self::bed()
    }
}

impl FromStr for Comparator {
    type Err = RegsortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields = Vec::new();
        let mut tiebreak = false;
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            if tiebreak {
                return Err(RegsortError::InvalidParameter {
                    parameter: "fields".to_string(),
                    reason: "'line' must be the last entry".to_string(),
                });
            }
            if part.eq_ignore_ascii_case("line") {
                tiebreak = true;
            } else {
                fields.push(part.parse()?);
            }
        }
        if fields.is_empty() && !tiebreak {
            return Err(RegsortError::InvalidParameter {
                parameter: "fields".to_string(),
                reason: "at least one field spec is required".to_string(),
            });
        }
        Ok(Self::new(fields).with_whole_line_tiebreak(tiebreak))
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self.fields.iter().map(ToString::to_string).collect();
        if self.whole_line_tiebreak {
            parts.push("line".to_string());
        }
        f.write_str(&parts.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Delimiter;
    use rstest::rstest;

    fn rec(line: &str) -> Record {
        Record::new(line.as_bytes().to_vec(), Delimiter::Tab)
    }

    fn keyed(cmp: &Comparator, line: &str) -> KeyedRecord {
        cmp.key(rec(line)).unwrap()
    }

    #[rstest]
    #[case("0", FieldSpec::text(0))]
    #[case("1n", FieldSpec::numeric(1))]
    #[case("2nr", FieldSpec::numeric(2).descending())]
    #[case("3r", FieldSpec::text(3).descending())]
    fn test_field_spec_parse(#[case] input: &str, #[case] expected: FieldSpec) {
        let spec: FieldSpec = input.parse().unwrap();
        assert_eq!(spec, expected);
        assert_eq!(spec.to_string(), input);
    }

    #[rstest]
    #[case("n1")]
    #[case("1x")]
    #[case("")]
    fn test_field_spec_parse_errors(#[case] input: &str) {
        assert!(input.parse::<FieldSpec>().is_err());
    }

    #[test]
    fn test_comparator_parse_errors() {
        assert!("".parse::<Comparator>().is_err());
        assert!("line,0".parse::<Comparator>().is_err());
    }

    #[test]
    fn test_bed_order() {
        let cmp = Comparator::bed();
        let a = keyed(&cmp, "chr1\t100\t200");
        let b = keyed(&cmp, "chr1\t20\t30");
        let c = keyed(&cmp, "chr10\t1\t2");
        assert_eq!(cmp.compare_keyed(&b, &a), Ordering::Less);
        assert_eq!(cmp.compare_keyed(&a, &c), Ordering::Less);
        assert_eq!(cmp.compare_keyed(&a, &a), Ordering::Equal);
    }

    #[test]
    fn test_first_nonzero_spec_wins_and_descending() {
        let cmp: Comparator = "1nr,0".parse().unwrap();
        let a = keyed(&cmp, "b\t5");
        let b = keyed(&cmp, "a\t5");
        let c = keyed(&cmp, "z\t9");
        assert_eq!(cmp.compare_keyed(&c, &a), Ordering::Less);
        assert_eq!(cmp.compare_keyed(&b, &a), Ordering::Less);
    }

    #[test]
    fn test_whole_line_tiebreak() {
        let plain = Comparator::bed();
        let tie = Comparator::bed().with_whole_line_tiebreak(true);
        let a = keyed(&tie, "chr1\t1\t2\tb");
        let b = keyed(&tie, "chr1\t1\t2\ta");
        assert_eq!(plain.compare_keyed(&a, &b), Ordering::Equal);
        assert_eq!(tie.compare_keyed(&a, &b), Ordering::Greater);
    }

    #[test]
    fn test_malformed_records_are_errors() {
        let cmp = Comparator::bed();
        let short = cmp.key(rec("chr1\t100")).unwrap_err();
        assert!(matches!(short, RegsortError::MalformedRecord { found: 2, required: 3, .. }));
        let non_numeric = cmp.key(rec("chr1\tabc\t200")).unwrap_err();
        assert!(non_numeric.to_string().contains("field 1 is not numeric"));
        assert!(cmp.compare(&rec("chr1\t1\t2"), &rec("chr1")).is_err());
    }

    #[test]
    fn test_validate_agrees_with_key() {
        let cmp: Comparator = "0,1n,3n".parse().unwrap();
        for line in ["chr1\t10\t20\t5", "chr1\t10\t20\tx", "chr1\t10\t20", "chr1\ty\t20\t5"] {
            assert_eq!(cmp.validate(&rec(line)).is_ok(), cmp.key(rec(line)).is_ok(), "{line}");
        }
        let err = cmp.validate(&rec("chr1\t10\t20\tx")).unwrap_err();
        assert!(err.to_string().contains("field 3 is not numeric"));
    }

    #[test]
    fn test_numeric_handles_negative_and_float() {
        let cmp: Comparator = "0n".parse().unwrap();
        let a = keyed(&cmp, "-3.5");
        let b = keyed(&cmp, "2");
        let c = keyed(&cmp, "10");
        assert_eq!(cmp.compare_keyed(&a, &b), Ordering::Less);
        assert_eq!(cmp.compare_keyed(&b, &c), Ordering::Less);
    }

    #[test]
    fn test_compare_values_fallback() {
        let spec = FieldSpec::numeric(0);
        assert_eq!(spec.compare_values(b"2", b"10"), Ordering::Less);
        assert_eq!(spec.compare_values(b"chrX", b"chrY"), Ordering::Less);
        assert_eq!(FieldSpec::text(0).compare_values(b"2", b"10"), Ordering::Greater);
    }

    #[test]
    fn test_required_fields_and_spec_for() {
        let cmp: Comparator = "0,4n".parse().unwrap();
        assert_eq!(cmp.required_fields(), 5);
        assert_eq!(cmp.spec_for(4), Some(&FieldSpec::numeric(4)));
        assert_eq!(cmp.spec_for(1), None);
    }
}

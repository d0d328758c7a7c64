//! Records and the row normalizer.
//!
//! A [`Record`] is an ordered list of `(key, value)` pairs tagged with the
//! physical row index it came from. While a row is being validated its keys are
//! normalized header names; the aggregator later remaps them to output names.

use serde::{Serialize, Serializer, ser::SerializeMap};

use crate::{header::ReconciledHeader, schema::ResolvedSchema};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    row: usize,
    fields: Vec<(String, String)>,
}

impl Record {
    pub fn new(row: usize) -> Self {
        Self {
            row,
            fields: Vec::new(),
        }
    }

    pub fn from_pairs<I, K, V>(row: usize, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut record = Self::new(row);
        for (key, value) in pairs {
            record.set(key, value);
        }
        record
    }

    pub fn row(&self) -> usize {
        self.row
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    /// Replaces the value under `key`, or appends it when absent.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| *name == key) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Keeps only keys known to the schema, renamed to their output names, in
    /// record order. Positional keys (no schema column) pass through unchanged.
    pub fn into_output(self, schema: &ResolvedSchema, positional: bool) -> Record {
        let fields = self
            .fields
            .into_iter()
            .filter_map(|(key, value)| match schema.output_key(&key) {
                Some(name) => Some((name.to_string(), value)),
                None if positional => Some((key, value)),
                None => None,
            })
            .collect();
        Record {
            row: self.row,
            fields,
        }
    }
}

impl Serialize for Record {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    Record(Record),
    ShapeMismatch { expected: usize, found: usize },
    /// Every field blank; only produced without a header row.
    Empty,
}

impl Normalized {
    pub fn shape_message(expected: usize, found: usize) -> String {
        format!("incorrect column count: expected {expected} field(s), found {found}")
    }
}

/// Where one parsed record sat in the physical input.
///
/// The CSV parser skips blank lines without reporting them. They are recovered
/// from how far the parser's line counter moved while reading the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSpan {
    /// Parser line number before the record was read.
    pub line_before: u64,
    /// Parser line number after the record was read.
    pub line_after: u64,
    /// Newlines inside quoted fields.
    pub embedded_newlines: u64,
    /// Whether the last byte consumed was the record's `\n`. A CRLF record
    /// stops at its `\r`, and a final record may have no terminator at all.
    pub ends_with_newline: bool,
}

impl RecordSpan {
    /// 1-based physical line the record starts on.
    pub fn start_line(&self) -> u64 {
        let leading = self
            .line_after
            .saturating_sub(self.line_before)
            .saturating_sub(self.embedded_newlines + u64::from(self.ends_with_newline));
        self.line_before + leading
    }

    /// Line the next record starts on when no blank line follows this one.
    pub fn next_line(&self) -> u64 {
        self.start_line() + self.embedded_newlines + 1
    }
}

#[derive(Debug, Clone)]
enum Layout {
    Header(ReconciledHeader),
    Positional {
        keys: Vec<String>,
        expected: Option<usize>,
    },
}

/// Maps raw field sequences onto keyed records.
#[derive(Debug, Clone)]
pub struct RowNormalizer {
    layout: Layout,
}

impl RowNormalizer {
    pub fn with_header(header: ReconciledHeader) -> Self {
        Self {
            layout: Layout::Header(header),
        }
    }

    /// No header row: fields are keyed by schema position, falling back to the
    /// field's index for positions the schema does not declare.
    pub fn positional(schema: &ResolvedSchema) -> Self {
        Self {
            layout: Layout::Positional {
                keys: schema.header_keys().map(str::to_string).collect(),
                expected: None,
            },
        }
    }

    pub fn is_positional(&self) -> bool {
        matches!(self.layout, Layout::Positional { .. })
    }

    pub fn normalize(&mut self, raw: &[String], row: usize) -> Normalized {
        match &mut self.layout {
            Layout::Header(header) => {
                let pairs = if raw.len() == header.header_count() {
                    header
                        .keys()
                        .iter()
                        .flatten()
                        .zip(raw)
                        .map(|(key, value)| (key.clone(), value.trim()))
                        .collect::<Vec<_>>()
                } else if raw.len() == header.width() {
                    header
                        .keys()
                        .iter()
                        .zip(raw)
                        .filter_map(|(key, value)| key.as_ref().map(|key| (key.clone(), value.trim())))
                        .collect::<Vec<_>>()
                } else {
                    return Normalized::ShapeMismatch {
                        expected: header.header_count(),
                        found: raw.len(),
                    };
                };
                Normalized::Record(Record::from_pairs(row, pairs))
            }
            Layout::Positional { keys, expected } => {
                if raw.iter().all(|value| value.trim().is_empty()) {
                    return Normalized::Empty;
                }
                let expected = *expected.get_or_insert(raw.len());
                if raw.len() != expected {
                    return Normalized::ShapeMismatch {
                        expected,
                        found: raw.len(),
                    };
                }
                let pairs = raw.iter().enumerate().map(|(idx, value)| {
                    let key = keys.get(idx).cloned().unwrap_or_else(|| idx.to_string());
                    (key, value.trim())
                });
                Normalized::Record(Record::from_pairs(row, pairs))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{header, schema::ColumnSpec};

    fn schema(names: &[&str]) -> ResolvedSchema {
        let specs = names
            .iter()
            .map(|name| ColumnSpec::new(name.to_uppercase(), *name))
            .collect::<Vec<_>>();
        ResolvedSchema::resolve(&specs).expect("valid schema")
    }

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|cell| cell.to_string()).collect()
    }

    #[test]
    fn header_mode_zips_and_trims() {
        let schema = schema(&["name", "email"]);
        let header = header::reconcile(&row(&["email", "name"]), &schema).unwrap();
        let mut normalizer = RowNormalizer::with_header(header);
        let Normalized::Record(record) = normalizer.normalize(&row(&[" a@x.io ", "Ann"]), 2)
        else {
            panic!("expected a record");
        };
        assert_eq!(record.row(), 2);
        assert_eq!(record.get("email"), Some("a@x.io"));
        assert_eq!(record.get("name"), Some("Ann"));
    }

    #[test]
    fn header_mode_flags_shape_mismatch() {
        let schema = schema(&["name", "email"]);
        let header = header::reconcile(&row(&["name", "email"]), &schema).unwrap();
        let mut normalizer = RowNormalizer::with_header(header);
        assert_eq!(
            normalizer.normalize(&row(&["Ann"]), 3),
            Normalized::ShapeMismatch {
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn header_mode_checks_width_against_named_cells() {
        let schema = schema(&["name", "email"]);
        let header = header::reconcile(&row(&["name", "email", ""]), &schema).unwrap();
        let mut normalizer = RowNormalizer::with_header(header);
        let Normalized::Record(record) = normalizer.normalize(&row(&["Ann", "a@x.io"]), 2) else {
            panic!("expected a record");
        };
        assert_eq!(record.get("email"), Some("a@x.io"));
        let Normalized::Record(padded) = normalizer.normalize(&row(&["Bob", "b@x.io", ""]), 3)
        else {
            panic!("expected a record");
        };
        assert_eq!(padded.len(), 2);
        assert_eq!(
            normalizer.normalize(&row(&["Cy"]), 4),
            Normalized::ShapeMismatch {
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn header_mode_skips_blank_middle_cells() {
        let schema = schema(&["name", "email"]);
        let header = header::reconcile(&row(&["name", "", "email"]), &schema).unwrap();
        let mut normalizer = RowNormalizer::with_header(header);
        let Normalized::Record(short) = normalizer.normalize(&row(&["Ann", "a@x.io"]), 2) else {
            panic!("expected a record");
        };
        assert_eq!(short.get("email"), Some("a@x.io"));
        let Normalized::Record(full) = normalizer.normalize(&row(&["Bob", "ignored", "b@x.io"]), 3)
        else {
            panic!("expected a record");
        };
        assert_eq!(full.get("email"), Some("b@x.io"));
    }

    #[test]
    fn record_span_recovers_physical_lines() {
        let plain = RecordSpan {
            line_before: 2,
            line_after: 3,
            embedded_newlines: 0,
            ends_with_newline: true,
        };
        assert_eq!((plain.start_line(), plain.next_line()), (2, 3));
        let after_blank = RecordSpan {
            line_before: 3,
            line_after: 5,
            ..plain
        };
        assert_eq!(after_blank.start_line(), 4);
        let multiline = RecordSpan {
            line_before: 2,
            line_after: 4,
            embedded_newlines: 1,
            ends_with_newline: true,
        };
        assert_eq!((multiline.start_line(), multiline.next_line()), (2, 4));
        let unterminated_after_blank = RecordSpan {
            line_before: 2,
            line_after: 3,
            embedded_newlines: 0,
            ends_with_newline: false,
        };
        assert_eq!(unterminated_after_blank.start_line(), 3);
        // "A\r\n\r\nB\r\n": B's read consumes A's pending "\n" and the blank line.
        let crlf_after_blank = RecordSpan {
            line_before: 1,
            line_after: 3,
            embedded_newlines: 0,
            ends_with_newline: false,
        };
        assert_eq!(crlf_after_blank.start_line(), 3);
    }

    #[test]
    fn positional_mode_locks_width_on_first_non_empty_row() {
        let schema = schema(&["name"]);
        let mut normalizer = RowNormalizer::positional(&schema);
        assert_eq!(normalizer.normalize(&row(&["", " "]), 1), Normalized::Empty);
        let Normalized::Record(record) = normalizer.normalize(&row(&["Ann", "42"]), 2) else {
            panic!("expected a record");
        };
        assert_eq!(record.get("name"), Some("Ann"));
        assert_eq!(record.get("1"), Some("42"));
        assert!(matches!(
            normalizer.normalize(&row(&["Bob"]), 3),
            Normalized::ShapeMismatch {
                expected: 2,
                found: 1
            }
        ));
    }

    #[test]
    fn into_output_renames_known_keys() {
        let schema = schema(&["name"]);
        let record = Record::from_pairs(2, [("name", "Ann"), ("stray", "x")]);
        let output = record.clone().into_output(&schema, false);
        assert_eq!(output.iter().collect::<Vec<_>>(), vec![("NAME", "Ann")]);
        let positional = record.into_output(&schema, true);
        assert_eq!(positional.get("stray"), Some("x"));
    }

    #[test]
    fn record_serializes_as_ordered_map() {
        let record = Record::from_pairs(2, [("b", "1"), ("a", "2")]);
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"b":"1","a":"2"}"#);
    }
}

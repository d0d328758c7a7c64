//! Per-column rule evaluation for one normalized record.
//!
//! Columns are evaluated in schema order and independently: a failure in one
//! column never suppresses checks on the next. For each column the order is
//! encoding scan, transforms, required, type, length, uniqueness, allowed
//! values. Transforms rewrite the record before any validation runs, so the
//! checks see (and the outputs carry) the transformed value.

use crate::{
    data::{self, ACCEPTED_DATE_FORMATS},
    rows::Record,
    schema::{ColumnType, ResolvedColumn, ResolvedSchema},
    transform,
    unique::UniquenessTracker,
};

/// Glyphs that only appear when text was decoded with the wrong encoding or
/// could not be decoded at all.
const PLACEHOLDER_GLYPHS: &[char] = &['\u{FFFD}', '□', '▯', '▢'];

/// UTF-8 sequences that were re-read as Latin-1/Windows-1252.
const MOJIBAKE_SIGNATURES: &[&str] = &[
    "Ã", "Â", "â€“", "â€œ", "â€", "Ã©", "ÿþ", "þÿ", "â€™", "â€”", "â€¦", "â€˜", "â€¢", "â„¢", "âˆ’",
    "âˆž", "â‚¬", "â„—", "â€º", "â€¹",
];

pub fn has_encoding_artifacts(value: &str) -> bool {
    value.contains(PLACEHOLDER_GLYPHS)
        || MOJIBAKE_SIGNATURES
            .iter()
            .any(|signature| value.contains(signature))
}

/// Validates and rewrites `record` in place. Returns every error message for
/// the row; an empty list means the row passed.
pub fn validate_record(
    schema: &ResolvedSchema,
    record: &mut Record,
    tracker: &mut UniquenessTracker,
) -> Vec<String> {
    let mut errors = Vec::new();
    for column in schema.columns() {
        validate_column(column, record, tracker, &mut errors);
    }
    errors
}

fn validate_column(
    column: &ResolvedColumn,
    record: &mut Record,
    tracker: &mut UniquenessTracker,
    errors: &mut Vec<String>,
) {
    let key = column.header_key.as_str();
    let label = column.column_name.as_str();
    let Some(raw) = record.get(key).map(str::to_string) else {
        if column.required {
            errors.push(format!("Required column '{label}' is empty."));
        }
        return;
    };
    let value_exists = !raw.trim().is_empty();

    if has_encoding_artifacts(&raw) {
        errors.push(format!(
            "Unknown or invalid character or possible encoding error found in column '{label}'."
        ));
    }

    let mut value = raw;
    if !column.transforms.is_empty() {
        value = transform::apply_all(&column.transforms, &value);
        record.set(key, value.as_str());
    }

    if !value_exists {
        if column.required {
            errors.push(format!("Required column '{label}' is empty."));
        }
        return;
    }

    if let Some(ty) = &column.column_type {
        match ty {
            ColumnType::Date => match data::canonical_date(&value) {
                Some(canonical) => {
                    record.set(key, canonical.as_str());
                    value = canonical;
                }
                None => errors.push(format!(
                    "Invalid date format in column '{label}'. Please use one of the following formats: {ACCEPTED_DATE_FORMATS}."
                )),
            },
            other if !data::matches_type(&value, other) => errors.push(format!(
                "Invalid type for column '{label}': expected {other}, got '{value}'"
            )),
            _ => {}
        }
    }

    let length = value.chars().count();
    if let Some(min) = column.min_length
        && length < min
    {
        errors.push(format!(
            "The value in column '{label}' is too short: Expected minimum length of {min}, got {length}"
        ));
    }
    if let Some(max) = column.max_length
        && length > max
    {
        errors.push(format!(
            "The value in column '{label}' is too long: Expected maximum length of {max}, got {length}"
        ));
    }

    if column.unique
        && let Some(first_row) = tracker.check(key, &value, record.row())
    {
        errors.push(format!(
            "Duplicate found in column '{label}': {value} (same with row {first_row})"
        ));
    }

    if let Some(allowed) = &column.allowed_values
        && !allowed.iter().any(|candidate| *candidate == value)
    {
        errors.push(format!(
            "Invalid value in column '{label}': expected one of ['{}'], found '{value}'.",
            allowed.join("', '")
        ));
    }
}

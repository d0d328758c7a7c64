use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::schema::ColumnType;

/// Canonical rendering for every accepted date input.
pub const CANONICAL_DATE_FORMAT: &str = "%m/%d/%Y";

/// Human-readable list of the accepted date layouts, used in error messages.
pub const ACCEPTED_DATE_FORMATS: &str = "m/d/Y, m-d-Y, Y/m/d, or Y-m-d";

static SCIENTIFIC_NOTATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?\d+(\.\d+)?[eE][+-]?\d+$").expect("scientific pattern compiles")
});
static NUMERIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?\s*$").expect("numeric pattern compiles")
});

/// Parses `m/d/Y`, `m-d-Y`, `Y/m/d`, or `Y-m-d`; day and month may omit the zero padding.
/// Both separators in one value must match.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    let separator = value.chars().find(|ch| matches!(ch, '/' | '-'))?;
    let parts = value.split(separator).collect::<Vec<_>>();
    let [first, second, third] = parts.as_slice() else {
        return None;
    };
    if !parts.iter().all(|part| is_all_digits(part)) {
        return None;
    }
    let (year, month, day) = match (first.len(), second.len(), third.len()) {
        (4, 1..=2, 1..=2) => (*first, *second, *third),
        (1..=2, 1..=2, 4) => (*third, *first, *second),
        _ => return None,
    };
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

/// Rewrites an accepted date into `mm/dd/YYYY`.
pub fn canonical_date(value: &str) -> Option<String> {
    parse_date(value).map(|date| date.format(CANONICAL_DATE_FORMAT).to_string())
}

pub fn is_integer(value: &str) -> bool {
    !SCIENTIFIC_NOTATION.is_match(value) && is_all_digits(value)
}

pub fn is_float(value: &str) -> bool {
    NUMERIC.is_match(value)
}

pub fn is_boolean(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false")
}

/// Whether `value` satisfies a non-date column type. Dates are handled by
/// [`canonical_date`] because a match also rewrites the value.
pub fn matches_type(value: &str, ty: &ColumnType) -> bool {
    match ty {
        ColumnType::String => true,
        ColumnType::Integer => is_integer(value),
        ColumnType::Float => is_float(value),
        ColumnType::Boolean => is_boolean(value),
        ColumnType::Date => parse_date(value).is_some(),
        ColumnType::Unknown(_) => false,
    }
}

fn is_all_digits(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

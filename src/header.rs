//! Header reconciliation.
//!
//! The first physical row is normalized (BOM, whitespace, parenthesized hints)
//! and compared against the resolved schema as sets. Any mismatch is fatal for
//! the read: the caller gets one composed message plus the structured lists.

use std::{collections::HashSet, sync::LazyLock};

use itertools::Itertools;
use regex::Regex;
use serde::Serialize;

use crate::schema::ResolvedSchema;

static PARENTHESIZED_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\([^()]*\)\s*$").expect("suffix pattern compiles"));
static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern compiles"));

const BOM: char = '\u{FEFF}';

/// Normalizes one header cell: `"\u{FEFF} Birthday  (M/D/Y) "` becomes `"Birthday"`.
pub fn normalize_cell(raw: &str) -> String {
    let without_bom = raw.strip_prefix(BOM).unwrap_or(raw);
    let trimmed = without_bom.trim();
    let without_hint = PARENTHESIZED_SUFFIX.replace(trimmed, "");
    WHITESPACE_RUN
        .replace_all(without_hint.trim(), " ")
        .into_owned()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HeaderMismatch {
    pub missing: Vec<String>,
    pub extra: Vec<String>,
    pub duplicates: Vec<String>,
    pub message: String,
}

/// Positional keys established by a successfully reconciled header row.
#[derive(Debug, Clone)]
pub struct ReconciledHeader {
    raw: Vec<String>,
    keys: Vec<Option<String>>,
}

impl ReconciledHeader {
    /// The header row exactly as it was read, before normalization.
    pub fn raw(&self) -> &[String] {
        &self.raw
    }

    /// Normalized key for each physical position; `None` where the cell was blank.
    pub fn keys(&self) -> &[Option<String>] {
        &self.keys
    }

    /// Number of cells in the header row, blank ones included. Rows of this
    /// width are also accepted, with blank-header positions dropped.
    pub fn width(&self) -> usize {
        self.raw.len()
    }

    /// Number of non-empty header cells; the field count data rows must match.
    pub fn header_count(&self) -> usize {
        self.keys.iter().flatten().count()
    }
}

pub fn reconcile(
    raw: &[String],
    schema: &ResolvedSchema,
) -> Result<ReconciledHeader, HeaderMismatch> {
    let keys = raw
        .iter()
        .map(|cell| Some(normalize_cell(cell)).filter(|key| !key.is_empty()))
        .collect::<Vec<_>>();
    let header = keys.iter().flatten().map(String::as_str).collect::<Vec<_>>();
    let expected = schema.header_keys().collect::<Vec<_>>();

    let header_set = header.iter().copied().collect::<HashSet<_>>();
    let expected_set = expected.iter().copied().collect::<HashSet<_>>();

    let missing = expected
        .iter()
        .filter(|name| !header_set.contains(*name))
        .unique()
        .map(|name| name.to_string())
        .collect::<Vec<_>>();
    let extra = header
        .iter()
        .filter(|name| !expected_set.contains(*name))
        .unique()
        .map(|name| name.to_string())
        .collect::<Vec<_>>();
    let duplicates = header
        .iter()
        .duplicates()
        .map(|name| name.to_string())
        .collect::<Vec<_>>();

    let mut parts = Vec::new();
    if !missing.is_empty() {
        parts.push(format!(
            "The uploaded file is missing the following columns: {}.",
            missing.join(", ")
        ));
    }
    if !extra.is_empty() {
        parts.push(format!(
            "The uploaded file contains columns that are not defined in the system: {}.",
            extra.join(", ")
        ));
    }
    if !duplicates.is_empty() {
        parts.push(format!("Duplicate headers found: {}.", duplicates.join(", ")));
    }
    if parts.is_empty() && header.len() != expected.len() {
        let hint = if expected.len() > header.len() {
            "Some headers may be missing."
        } else {
            "Extra headers may be present."
        };
        parts.push(format!(
            "The uploaded file does not match the expected column structure. {hint} Please review the file and try again."
        ));
    }

    if parts.is_empty() {
        Ok(ReconciledHeader {
            raw: raw.to_vec(),
            keys,
        })
    } else {
        Err(HeaderMismatch {
            missing,
            extra,
            duplicates,
            message: parts.join(" "),
        })
    }
}

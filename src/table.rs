//! Plain-text tables for the command-line output.

use std::{borrow::Cow, fmt::Write as _};

use itertools::Itertools;

use crate::{result::ReadResult, schema::ResolvedSchema};

pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths = headers
        .iter()
        .map(|header| header.chars().count().max(3))
        .collect::<Vec<_>>();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(flatten(cell).chars().count());
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_line(headers.iter().copied(), &widths));
    let rule = widths
        .iter()
        .map(|width| "-".repeat(*width))
        .collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_line(rule.iter().map(String::as_str), &widths));
    for row in rows {
        let cells = row.iter().map(|cell| flatten(cell)).collect::<Vec<_>>();
        let _ = writeln!(output, "{}", format_line(cells.iter().map(|c| c.as_ref()), &widths));
    }
    output
}

/// One line per declared column with its type, flags, and transforms.
pub fn render_columns(schema: &ResolvedSchema) -> String {
    let rows = schema
        .columns()
        .iter()
        .map(|column| {
            let mut checks = Vec::new();
            if column.required {
                checks.push("required".to_string());
            }
            if column.unique {
                checks.push("unique".to_string());
            }
            if let Some(min) = column.min_length {
                checks.push(format!("min_length[{min}]"));
            }
            if let Some(max) = column.max_length {
                checks.push(format!("max_length[{max}]"));
            }
            if let Some(values) = &column.allowed_values {
                checks.push(format!("one of [{}]", values.join(", ")));
            }
            vec![
                column.column_name.clone(),
                column.name.clone(),
                column
                    .column_type
                    .as_ref()
                    .map(|kind| kind.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                checks.join(" "),
                column.transforms.iter().join(" "),
            ]
        })
        .collect::<Vec<_>>();
    render_table(&["header", "name", "type", "checks", "transforms"], &rows)
}

/// Summary lines followed by up to `max_rows` failed rows and their messages.
pub fn render_report(result: &ReadResult, max_rows: usize) -> String {
    let mut output = String::new();
    let outcome = if !result.status {
        "failed"
    } else if result.is_truncated() {
        "stopped early"
    } else {
        "completed"
    };
    let _ = writeln!(output, "Validation {outcome}");
    if !result.error.is_empty() {
        let _ = writeln!(output, "{}", result.error);
    }
    let _ = writeln!(
        output,
        "processed: {}  skipped: {}  failed rows: {}  errors: {}",
        result.processed, result.skipped, result.total_error_rows, result.error_count
    );
    if let Some(path) = &result.downloadable {
        let _ = writeln!(output, "failed rows written to {}", path.display());
    }
    if let Some(err) = &result.export_error {
        let _ = writeln!(output, "export failed: {err}");
    }

    let grouped = result.errors.iter().chunk_by(|error| error.row);
    let rows = (&grouped)
        .into_iter()
        .take(max_rows)
        .map(|(row, errors)| vec![row.to_string(), errors.map(|e| e.message.as_str()).join("; ")])
        .collect::<Vec<_>>();
    if !rows.is_empty() {
        output.push('\n');
        output.push_str(&render_table(&["row", "errors"], &rows));
        if result.total_error_rows > rows.len() {
            let _ = writeln!(
                output,
                "... {} more failed row(s) not shown",
                result.total_error_rows - rows.len()
            );
        }
    }
    output
}

fn format_line<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let line = cells
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}"))
        .join("  ");
    line.trim_end().to_string()
}

fn flatten(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnSpec, ColumnType};

    #[test]
    fn render_table_pads_columns_and_flattens_newlines() {
        let rendered = render_table(
            &["row", "errors"],
            &[vec!["2".to_string(), "bad\nvalue".to_string()]],
        );
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "row  errors");
        assert_eq!(lines[1], "---  ---------");
        assert_eq!(lines[2], "2    bad value");
    }

    #[test]
    fn render_columns_lists_checks_and_transforms() {
        let schema = ResolvedSchema::resolve(&[ColumnSpec::new("email", "Email")
            .with_type(ColumnType::String)
            .with_rules("required|lowercase|max_length[40]")])
        .unwrap();
        let rendered = render_columns(&schema);
        assert!(rendered.contains("Email"));
        assert!(rendered.contains("required max_length[40]"));
        assert!(rendered.contains("lowercase"));
    }
}

//! Writes failed rows to a downloadable delimited file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use log::info;

use crate::{config::ExportConfig, io_utils::{self, CsvDialect}};

/// Writes a BOM, the original header row (when the input had one), then every
/// failed raw row in encounter order. Returns the written path.
pub fn write_error_rows(
    export: &ExportConfig,
    dialect: CsvDialect,
    header: Option<&[String]>,
    rows: &[Vec<String>],
) -> Result<PathBuf> {
    let path = export.path();
    let mut writer = io_utils::create_csv_writer_with_bom(&path, dialect)?;
    if let Some(header) = header {
        writer
            .write_record(header)
            .with_context(|| format!("Writing header to {path:?}"))?;
    }
    for row in rows {
        writer
            .write_record(row)
            .with_context(|| format!("Writing error row to {path:?}"))?;
    }
    writer
        .flush()
        .with_context(|| format!("Flushing export file {path:?}"))?;
    info!("Wrote {} failed row(s) to {:?}", rows.len(), path);
    Ok(path)
}

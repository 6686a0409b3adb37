//! Tabular export of a batch result.
//!
//! Two sheets, written as CSV:
//! - `<stem>-Data.csv`: one row per processed record, columns in template order
//! - `<stem>-Validation.csv`: `Record,Error`, one row per error (only when errors exist)

use std::path::{Path, PathBuf};

use crate::api::logs::log_success;
use crate::error::{ExportError, ExportResult};
use crate::models::Template;
use crate::path::display_value;
use crate::transform::BatchOutput;

pub const DATA_SHEET_SUFFIX: &str = "-Data.csv";
pub const VALIDATION_SHEET_SUFFIX: &str = "-Validation.csv";

const VALIDATION_HEADER: [&str; 2] = ["Record", "Error"];

/// Render the data sheet.
pub fn data_sheet(template: &Template, output: &BatchOutput) -> ExportResult<String> {
    let fields = template.field_names();
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer.write_record(&fields)?;
    for record in &output.processed_records {
        writer.write_record(fields.iter().map(|field| {
            record.get(field).map(display_value).unwrap_or_default()
        }))?;
    }

    finish(writer)
}

/// Render the validation sheet, or `None` when there is nothing to report.
pub fn validation_sheet(output: &BatchOutput) -> ExportResult<Option<String>> {
    if output.validation_errors.is_empty() {
        return Ok(None);
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(VALIDATION_HEADER)?;
    for (index, errors) in output.validation_errors.iter() {
        let index = index.to_string();
        for error in errors {
            writer.write_record([index.as_str(), error.as_str()])?;
        }
    }

    finish(writer).map(Some)
}

/// Write both sheets under `dir`, returning the files written.
pub fn write_workbook(
    dir: &Path,
    stem: &str,
    template: &Template,
    output: &BatchOutput,
) -> ExportResult<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::new();

    let data_path = dir.join(format!("{}{}", stem, DATA_SHEET_SUFFIX));
    std::fs::write(&data_path, data_sheet(template, output)?)?;
    written.push(data_path);

    if let Some(sheet) = validation_sheet(output)? {
        let validation_path = dir.join(format!("{}{}", stem, VALIDATION_SHEET_SUFFIX));
        std::fs::write(&validation_path, sheet)?;
        written.push(validation_path);
    }

    log_success(format!(
        "Exported {} records to {}",
        output.processed_records.len(),
        dir.display()
    ));
    Ok(written)
}

fn finish(writer: csv::Writer<Vec<u8>>) -> ExportResult<String> {
    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Buffer(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ExportError::Buffer(e.to_string()))
}

use std::path::Path;

use anyhow::{Context, Result};

use super::error::{DataError, Precondition};
use super::model::{Dataset, Row};

const BOM: &str = "\u{FEFF}";
const UNSAFE_FILENAME_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Export targets offered in the UI. Both write the same UTF-8 CSV; the
/// Excel flavour only changes the dialog wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFlavor {
    Csv,
    ExcelCsv,
}

impl ExportFlavor {
    pub fn dialog_title(self) -> &'static str {
        match self {
            ExportFlavor::Csv => "Export CSV",
            ExportFlavor::ExcelCsv => "Export Excel-compatible CSV",
        }
    }

    pub fn filter_name(self) -> &'static str {
        match self {
            ExportFlavor::Csv => "CSV",
            ExportFlavor::ExcelCsv => "Excel CSV (UTF-8 with BOM)",
        }
    }
}

fn csv_error(err: impl std::fmt::Display) -> DataError {
    DataError::CsvWrite(err.to_string())
}

/// BOM, header line, then one `\n`-terminated line per row with exactly
/// `columns`, in order. Fields are quoted only when they hold a comma, quote
/// or line break.
pub fn format_csv<'a>(
    rows: impl IntoIterator<Item = &'a Row>,
    columns: &[String],
) -> Result<String, DataError> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(BOM.as_bytes().to_vec());

    writer.write_record(columns).map_err(csv_error)?;
    for row in rows {
        writer
            .write_record(
                columns
                    .iter()
                    .map(|c| row.get(c).map(String::as_str).unwrap_or("")),
            )
            .map_err(csv_error)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| csv_error(e.into_error()))?;
    String::from_utf8(bytes).map_err(csv_error)
}

/// Serialize the rows currently in view (the filter result when one is
/// active, else everything) restricted to the selected columns.
pub fn export_rows(dataset: &Dataset, view: Option<&[usize]>) -> Result<String, DataError> {
    if dataset.is_empty() {
        return Err(Precondition::EmptyDataset.into());
    }
    let columns = dataset.selection();
    if columns.is_empty() {
        return Err(Precondition::NoColumnsSelected.into());
    }

    match view {
        Some(indices) => {
            if indices.is_empty() {
                return Err(Precondition::NoRowsToExport.into());
            }
            format_csv(indices.iter().filter_map(|&i| dataset.row(i)), columns)
        }
        None => format_csv(dataset.rows(), columns),
    }
}

/// File name for an export: the user's name if given, otherwise one derived
/// from the active search. Unsafe characters become `_`.
pub fn export_file_name(custom: &str, search: &str, filter_active: bool) -> String {
    let custom = custom.trim();
    let search = search.trim();
    let stem = if !custom.is_empty() {
        custom.to_string()
    } else if filter_active && !search.is_empty() {
        format!("{search}_筛选数据")
    } else {
        "数据导出".to_string()
    };
    let stem: String = stem
        .chars()
        .map(|c| if UNSAFE_FILENAME_CHARS.contains(&c) { '_' } else { c })
        .collect();
    format!("{stem}.csv")
}

/// Write exported text to disk.
pub fn write_export(path: &Path, text: &str) -> Result<()> {
    std::fs::write(path, text.as_bytes())
        .with_context(|| format!("writing export to {}", path.display()))
}

use std::fmt;
use std::path::Path;

use anyhow::{bail, Context, Result};
use calamine::{open_workbook_auto, Data, Reader};

use super::derive::format_number;
use super::encoding;
use super::error::DataError;
use super::parser::{self, ParsedTable};
use crate::config::Settings;

/// Extensions accepted by the open dialog.
pub const CSV_EXTENSIONS: [&str; 2] = ["csv", "txt"];
pub const SPREADSHEET_EXTENSIONS: [&str; 4] = ["xlsx", "xlsm", "xls", "ods"];

// ---------------------------------------------------------------------------
// Loaded table + summary
// ---------------------------------------------------------------------------

/// Where the rows came from.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceFormat {
    Csv { encoding: String },
    Spreadsheet { sheet: String },
}

/// Parser output plus what the status line reports about it.
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub file_name: String,
    pub format: SourceFormat,
    pub table: ParsedTable,
}

impl LoadedTable {
    pub fn summary(&self) -> IngestSummary {
        IngestSummary {
            file_name: self.file_name.clone(),
            format: self.format.clone(),
            rows: self.table.rows.len(),
            columns: self.table.columns.len(),
            skipped_lines: self.table.skipped_lines,
            suspect_rows: self.table.suspect_rows,
            blank_rows_dropped: self.table.blank_rows_dropped,
        }
    }
}

/// Outcome of one ingestion, shown to the user after loading.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestSummary {
    pub file_name: String,
    pub format: SourceFormat,
    pub rows: usize,
    pub columns: usize,
    pub skipped_lines: usize,
    pub suspect_rows: usize,
    pub blank_rows_dropped: usize,
}

impl fmt::Display for IngestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Loaded \"{}\" ", self.file_name)?;
        match &self.format {
            SourceFormat::Csv { encoding } => write!(f, "(CSV, {encoding})")?,
            SourceFormat::Spreadsheet { sheet } => write!(f, "(sheet \"{sheet}\")")?,
        }
        write!(f, ": {} rows, {} columns", self.rows, self.columns)?;
        if self.skipped_lines > 0 {
            write!(f, "; {} unparseable lines skipped", self.skipped_lines)?;
        }
        if self.blank_rows_dropped > 0 {
            write!(f, "; {} blank rows dropped", self.blank_rows_dropped)?;
        }
        if self.suspect_rows > 0 {
            write!(
                f,
                "; {} rows may contain garbled text (re-save the file as UTF-8)",
                self.suspect_rows
            )?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a table from a file. Dispatch by extension.
///
/// Supported formats:
/// * `.csv` / `.txt` – comma-separated text in any of the candidate encodings
/// * `.xlsx` / `.xlsm` / `.xls` / `.ods` – first worksheet, first row = headers
pub fn load_file(path: &Path, settings: &Settings) -> Result<LoadedTable> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let size = std::fs::metadata(path)
        .with_context(|| format!("reading metadata of {}", path.display()))?
        .len();
    check_file_size(size, settings.max_file_bytes)?;

    let (format, table) = if CSV_EXTENSIONS.contains(&ext.as_str()) {
        load_csv(path, settings)?
    } else if SPREADSHEET_EXTENSIONS.contains(&ext.as_str()) {
        load_spreadsheet(path)?
    } else {
        bail!("Unsupported file extension: .{ext} (supported: .csv, .txt, .xlsx, .xlsm, .xls, .ods)");
    };

    Ok(LoadedTable {
        file_name,
        format,
        table,
    })
}

/// Reject empty and oversized files before anything is read.
pub fn check_file_size(size: u64, limit: u64) -> Result<(), DataError> {
    if size == 0 {
        return Err(DataError::EmptyFile);
    }
    if size > limit {
        return Err(DataError::FileTooLarge { size, limit });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

fn load_csv(path: &Path, settings: &Settings) -> Result<(SourceFormat, ParsedTable)> {
    let bytes = std::fs::read(path).context("reading CSV file")?;
    let decoded = encoding::resolve(&bytes, settings)?;
    let table = parser::parse_document(&decoded.text).context("parsing CSV")?;
    Ok((
        SourceFormat::Csv {
            encoding: decoded.label,
        },
        table,
    ))
}

// ---------------------------------------------------------------------------
// Spreadsheet loader
// ---------------------------------------------------------------------------

/// Read the first worksheet with calamine and hand its rows to the grid
/// normalizer.
fn load_spreadsheet(path: &Path) -> Result<(SourceFormat, ParsedTable)> {
    let mut workbook = open_workbook_auto(path).context("opening workbook")?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .context("the workbook has no worksheets")?;
    let range = workbook
        .worksheet_range(&sheet)
        .with_context(|| format!("reading worksheet '{sheet}'"))?;

    let grid: Vec<Vec<String>> = range
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect();
    log::debug!("Sheet '{sheet}': {} raw rows", grid.len());

    let table = parser::table_from_grid(grid).context("reading worksheet rows")?;
    Ok((SourceFormat::Spreadsheet { sheet }, table))
}

/// Stringify a spreadsheet cell the way it is displayed.
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => format_number(*f),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(dt) => {
                let text = dt.to_string();
                match text.strip_suffix(" 00:00:00") {
                    Some(date) => date.to_string(),
                    None => text,
                }
            }
            None => format_number(dt.as_f64()),
        },
        Data::Error(e) => e.to_string(),
    }
}

use crate::error::{PipelineError, PipelineResult};
use crate::types::{Field, RawRow, RawTable};
use crate::util::excel_serial_to_datetime;
use calamine::{open_workbook_auto, Data, Reader};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name prefix of the branch case export.
pub const DEFAULT_SOURCE_PREFIX: &str = "Detalle de Casos Abiertos Técnica Sucursal";

/// The spreadsheet export has a five-row title block above the header.
pub const SPREADSHEET_SKIP_ROWS: usize = 5;

const SPREADSHEET_EXTENSIONS: [&str; 4] = ["xlsx", "xlsm", "xls", "ods"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Csv,
    Spreadsheet,
}

#[derive(Debug, Clone)]
pub struct LoadReport {
    pub total_rows: usize,
    pub blank_rows: usize,
    pub columns: Vec<String>,
}

pub fn source_kind(path: &Path) -> Option<SourceKind> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    if ext == "csv" {
        Some(SourceKind::Csv)
    } else if SPREADSHEET_EXTENSIONS.contains(&ext.as_str()) {
        Some(SourceKind::Spreadsheet)
    } else {
        None
    }
}

pub fn default_skip_rows(path: &Path) -> usize {
    match source_kind(path) {
        Some(SourceKind::Spreadsheet) => SPREADSHEET_SKIP_ROWS,
        _ => 0,
    }
}

/// First supported file in `dir` (by name) whose name starts with `prefix`.
pub fn discover_source(dir: &Path, prefix: &str) -> PipelineResult<PathBuf> {
    let pattern = format!(
        "{}/{}*",
        glob::Pattern::escape(&dir.to_string_lossy()),
        glob::Pattern::escape(prefix)
    );
    let mut found: Vec<PathBuf> = glob::glob(&pattern)?
        .filter_map(Result::ok)
        .filter(|p| source_kind(p).is_some())
        .collect();
    found.sort();
    debug!(pattern = %pattern, candidates = found.len(), "source discovery");
    found
        .into_iter()
        .next()
        .ok_or_else(|| PipelineError::SourceNotFound(prefix.to_string()))
}

/// Read the export at `path`, ignoring `skip_rows` rows above the header.
/// Files without a recognized extension are read as CSV.
pub fn load_table(path: &Path, skip_rows: usize) -> PipelineResult<(RawTable, LoadReport)> {
    let lines = match source_kind(path) {
        Some(SourceKind::Spreadsheet) => read_sheet_rows(path)?,
        _ => read_csv_rows(path)?,
    };
    let (table, report) = build_table(lines, skip_rows);
    info!(
        path = %path.display(),
        rows = table.rows.len(),
        blank = report.blank_rows,
        columns = report.columns.len(),
        "source loaded"
    );
    Ok((table, report))
}

/// Zone and open date must exist as columns before normalization can run.
pub fn check_required_columns(columns: &[String]) -> PipelineResult<()> {
    for field in Field::REQUIRED {
        if !columns.iter().any(|c| c == field.column()) {
            return Err(PipelineError::MissingColumn(field.column()));
        }
    }
    Ok(())
}

fn read_csv_rows(path: &Path) -> PipelineResult<Vec<(usize, Vec<String>)>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let line = record
            .position()
            .map_or(rows.len() + 1, |p| p.line() as usize);
        rows.push((line, record.iter().map(str::to_string).collect()));
    }
    Ok(rows)
}

fn read_sheet_rows(path: &Path) -> PipelineResult<Vec<(usize, Vec<String>)>> {
    let mut workbook = open_workbook_auto(path)?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(PipelineError::EmptyWorkbook)?;
    let range = workbook.worksheet_range(&sheet)?;

    // `rows()` starts at the first used row; pad so skip counts match the sheet.
    let first = range.start().map_or(0, |(r, _)| r as usize);
    let mut rows: Vec<(usize, Vec<String>)> = (0..first).map(|i| (i + 1, Vec::new())).collect();
    rows.extend(
        range
            .rows()
            .enumerate()
            .map(|(i, row)| (first + i + 1, row.iter().map(cell_text).collect())),
    );
    Ok(rows)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        // Case numbers come through as floats; drop the trailing `.0`.
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => excel_serial_to_datetime(dt.as_f64())
            .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default(),
    }
}

fn build_table(lines: Vec<(usize, Vec<String>)>, skip_rows: usize) -> (RawTable, LoadReport) {
    let mut iter = lines.into_iter().skip(skip_rows);
    let columns: Vec<String> = iter
        .next()
        .map(|(_, header)| {
            header
                .iter()
                .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
                .collect()
        })
        .unwrap_or_default();

    let mut total_rows = 0usize;
    let mut blank_rows = 0usize;
    let mut rows = Vec::new();
    for (line, cells) in iter {
        total_rows += 1;
        let values: HashMap<String, String> = columns
            .iter()
            .zip(cells)
            .filter(|(name, value)| !name.is_empty() && !value.trim().is_empty())
            .map(|(name, value)| (name.clone(), value))
            .collect();
        if values.is_empty() {
            blank_rows += 1;
            continue;
        }
        rows.push(RawRow { line, values });
    }

    let report = LoadReport {
        total_rows,
        blank_rows,
        columns: columns.clone(),
    };
    (RawTable { columns, rows }, report)
}

use calamine::{open_workbook_auto, Data, DataType, Reader};
use encoding_rs::Encoding;
use std::path::Path;
use thiserror::Error;

use custodia_core::DEFAULT_TIMESTAMP_FORMAT;

use crate::coerce::RawRow;
use crate::schema::ReaderHints;
use crate::util::normalize_header;

const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

#[derive(Error, Debug)]
pub enum ReadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),
    #[error("Unknown encoding: {0}")]
    UnknownEncoding(String),
    #[error("Workbook has no sheets")]
    NoSheets,
}

/// Header row and data rows of one extract.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl Table {
    pub fn has_column(&self, column: &str) -> bool {
        let wanted = normalize_header(column);
        self.headers.iter().any(|h| normalize_header(h) == wanted)
    }
}

/// Read every data row of `path`.
pub fn read_rows(path: &Path, hints: &ReaderHints) -> Result<Vec<RawRow>, ReadError> {
    read_table(path, hints).map(|table| table.rows)
}

/// Spreadsheets are picked by extension; anything else is treated as
/// delimited text.
pub fn read_table(path: &Path, hints: &ReaderHints) -> Result<Table, ReadError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase();
    if SPREADSHEET_EXTENSIONS.contains(&ext.as_str()) {
        read_spreadsheet(path, hints)
    } else {
        let bytes = std::fs::read(path)?;
        read_delimited(&bytes, hints)
    }
}

/// Decode `bytes` with the configured encoding, skip the preamble lines,
/// then parse the remainder as a headed, delimited table.
pub fn read_delimited(bytes: &[u8], hints: &ReaderHints) -> Result<Table, ReadError> {
    let encoding = Encoding::for_label(hints.encoding.trim().as_bytes())
        .ok_or_else(|| ReadError::UnknownEncoding(hints.encoding.clone()))?;
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        tracing::warn!(encoding = encoding.name(), "input contains undecodable bytes");
    }

    let body = skip_lines(&text, hints.skip_rows);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(hints.separator)
        .from_reader(body.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut rows: Vec<RawRow> = Vec::new();
    for result in reader.records() {
        let record = result?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        rows.push(
            headers
                .iter()
                .enumerate()
                .map(|(idx, header)| (header.as_str(), record.get(idx)))
                .collect(),
        );
    }
    Ok(Table { headers, rows })
}

fn skip_lines(text: &str, count: usize) -> &str {
    let mut rest = text;
    for _ in 0..count {
        match rest.find('\n') {
            Some(pos) => rest = &rest[pos + 1..],
            None => return "",
        }
    }
    rest
}

/// First sheet only. The row after `skip_rows` is the header.
///
/// `skip_rows` counts sheet rows from the top, but calamine's range begins
/// at the first non-empty row, so the leading blank rows it already left out
/// are taken off the skip count.
pub fn read_spreadsheet(path: &Path, hints: &ReaderHints) -> Result<Table, ReadError> {
    let mut workbook = open_workbook_auto(path)?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(ReadError::NoSheets)?;
    let range = workbook.worksheet_range(&sheet)?;

    let first_row = range.start().map_or(0, |(row, _)| row as usize);
    let mut lines = range.rows().skip(hints.skip_rows.saturating_sub(first_row));
    let headers: Vec<String> = match lines.next() {
        Some(row) => row.iter().map(|c| cell_text(c).unwrap_or_default()).collect(),
        None => return Ok(Table::default()),
    };

    let mut rows = Vec::new();
    for line in lines {
        let cells: Vec<Option<String>> = line.iter().map(cell_text).collect();
        if cells.iter().all(|c| c.as_deref().map_or(true, |s| s.trim().is_empty())) {
            continue;
        }
        let mut row = RawRow::new();
        for (idx, header) in headers.iter().enumerate() {
            row.insert(header, cells.get(idx).cloned().flatten());
        }
        rows.push(row);
    }
    Ok(Table { headers, rows })
}

/// Spreadsheet dates become ISO timestamps so date coercion can fall back
/// to them whatever the declared text format is.
fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => Some(s.clone()),
        Data::DateTime(_) => cell
            .as_datetime()
            .map(|d| d.format(DEFAULT_TIMESTAMP_FORMAT).to_string()),
        other => Some(other.to_string()),
    }
}

// oppsift - core/loader.rs
//
// Dataset loader: uploaded bytes + file name in, `Table` out.
// Core layer: works on in-memory bytes, never touches the filesystem.
//
// No schema validation happens here; any rectangular sheet is accepted.

use crate::core::model::{Cell, CellKind, Column, Table};
use crate::util::constants;
use crate::util::error::LoadError;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::collections::HashMap;
use std::io::Cursor;

/// Input format selected from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    DelimitedText,
    Workbook,
}

impl InputFormat {
    /// Dispatch on the (case-insensitive) extension of `file_name`.
    pub fn from_file_name(file_name: &str) -> Result<Self, LoadError> {
        let extension = std::path::Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match extension.as_str() {
            "csv" => Ok(InputFormat::DelimitedText),
            "xlsx" | "xls" => Ok(InputFormat::Workbook),
            _ => Err(LoadError::UnsupportedExtension {
                file_name: file_name.to_string(),
                extension,
            }),
        }
    }
}

/// Load an uploaded dataset.
///
/// `.csv` is decoded as UTF-8, falling back to Latin-1; `.xlsx`/`.xls` read
/// the first worksheet. Any other extension fails before reading the bytes.
pub fn load_dataset(file_name: &str, bytes: &[u8]) -> Result<Table, LoadError> {
    let format = InputFormat::from_file_name(file_name)?;
    let table = match format {
        InputFormat::DelimitedText => {
            let text = decode_text(file_name, bytes)?;
            parse_delimited(file_name, &text)?
        }
        InputFormat::Workbook => parse_workbook(file_name, bytes)?,
    };

    tracing::info!(
        file = file_name,
        format = ?format,
        rows = table.row_count(),
        columns = table.column_count(),
        "Dataset loaded"
    );
    Ok(table)
}

// =============================================================================
// Delimited text
// =============================================================================

/// Decode bytes as UTF-8 (BOM stripped), else as Latin-1.
fn decode_text(file_name: &str, bytes: &[u8]) -> Result<String, LoadError> {
    let body = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(body) {
        Ok(s) => Ok(s.to_string()),
        Err(e) => {
            tracing::warn!(
                file = file_name,
                error = %e,
                "File is not valid UTF-8; retrying as Latin-1"
            );
            // WHATWG maps the "latin1" label to windows-1252.
            let (decoded, _, had_errors) = encoding_rs::WINDOWS_1252.decode(body);
            if had_errors {
                return Err(LoadError::Encoding {
                    file_name: file_name.to_string(),
                });
            }
            Ok(decoded.into_owned())
        }
    }
}

/// Parse decoded delimited text. The first record is the header.
fn parse_delimited(file_name: &str, text: &str) -> Result<Table, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut records = reader.records();
    let header = match records.next() {
        Some(record) => record.map_err(|e| LoadError::Csv {
            file_name: file_name.to_string(),
            source: e,
        })?,
        None => return Ok(Table::default()),
    };
    let names = unique_headers(header.iter().map(str::to_string));

    let mut raw_columns: Vec<Vec<Cell>> = vec![Vec::new(); names.len()];
    let mut truncated_rows = 0usize;

    for record in records {
        let record = record.map_err(|e| LoadError::Csv {
            file_name: file_name.to_string(),
            source: e,
        })?;
        if record.len() > names.len() {
            truncated_rows += 1;
        }
        for (idx, column) in raw_columns.iter_mut().enumerate() {
            column.push(text_cell(record.get(idx).unwrap_or("")));
        }
    }

    if truncated_rows > 0 {
        tracing::warn!(
            file = file_name,
            rows = truncated_rows,
            "Rows with more fields than the header were truncated"
        );
    }

    let columns = names
        .into_iter()
        .zip(raw_columns)
        .map(|(name, values)| Column::new(name, infer_column_type(values)))
        .collect();
    Ok(Table::from_columns(columns))
}

/// Raw text to cell: missing-value tokens become null.
fn text_cell(raw: &str) -> Cell {
    let trimmed = raw.trim();
    if constants::NULL_TOKENS.contains(&trimmed) {
        Cell::Null
    } else {
        Cell::text(raw)
    }
}

/// Narrow an all-text column to integers, floats or booleans when every
/// non-null cell parses as that type.
fn infer_column_type(values: Vec<Cell>) -> Vec<Cell> {
    let target = {
        let texts: Vec<&str> = values
            .iter()
            .filter_map(Cell::as_text)
            .map(str::trim)
            .collect();
        if texts.is_empty() {
            None
        } else if texts.iter().all(|s| s.parse::<i64>().is_ok()) {
            Some(CellKind::Int)
        } else if texts.iter().all(|s| s.parse::<f64>().is_ok()) {
            Some(CellKind::Float)
        } else if texts.iter().all(|s| parse_bool(s).is_some()) {
            Some(CellKind::Bool)
        } else {
            None
        }
    };

    match target {
        Some(kind) => values
            .into_iter()
            .map(|cell| match cell {
                Cell::Text(s) => narrow(s.trim(), kind),
                other => other,
            })
            .collect(),
        None => values,
    }
}

fn narrow(s: &str, kind: CellKind) -> Cell {
    match kind {
        CellKind::Int => s.parse::<i64>().map_or(Cell::Null, Cell::Int),
        CellKind::Float => s.parse::<f64>().map_or(Cell::Null, Cell::Float),
        CellKind::Bool => parse_bool(s).map_or(Cell::Null, Cell::Bool),
        _ => Cell::text(s),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Fill empty header names and de-duplicate repeated ones as `Name.1`, `Name.2`.
fn unique_headers(raw: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut names = Vec::new();
    for (idx, name) in raw.enumerate() {
        let trimmed = name.trim();
        let base = if trimmed.is_empty() {
            format!("{}{idx}", constants::UNNAMED_COLUMN_PREFIX)
        } else {
            trimmed.to_string()
        };
        let mut candidate = base.clone();
        while let Some(count) = seen.get_mut(&candidate) {
            *count += 1;
            candidate = format!("{base}.{count}");
        }
        seen.insert(candidate.clone(), 0);
        names.push(candidate);
    }
    names
}

// =============================================================================
// Workbook
// =============================================================================

/// Read the first worksheet of an xlsx/xls workbook.
fn parse_workbook(file_name: &str, bytes: &[u8]) -> Result<Table, LoadError> {
    let mut workbook =
        open_workbook_auto_from_rs(Cursor::new(bytes.to_vec())).map_err(|e| {
            LoadError::Workbook {
                file_name: file_name.to_string(),
                source: e,
            }
        })?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| LoadError::NoWorksheet {
            file_name: file_name.to_string(),
        })?
        .map_err(|e| LoadError::Workbook {
            file_name: file_name.to_string(),
            source: e,
        })?;

    let mut rows = range.rows();
    let header = match rows.next() {
        Some(row) => row,
        None => return Ok(Table::default()),
    };
    let names = unique_headers(header.iter().map(|c| workbook_cell(c).to_string()));

    let mut raw_columns: Vec<Vec<Cell>> = vec![Vec::new(); names.len()];
    for row in rows {
        for (idx, column) in raw_columns.iter_mut().enumerate() {
            column.push(row.get(idx).map_or(Cell::Null, workbook_cell));
        }
    }

    let columns = names
        .into_iter()
        .zip(raw_columns)
        .map(|(name, values)| Column::new(name, narrow_integral_floats(values)))
        .collect();
    Ok(Table::from_columns(columns))
}

/// Workbooks store every number as a float. A column whose floats are all
/// whole numbers in `i64` range reads back as integers; one fractional value
/// keeps the whole column as floats.
fn narrow_integral_floats(values: Vec<Cell>) -> Vec<Cell> {
    let all_integral = values.iter().all(|cell| match cell {
        Cell::Float(f) => is_integral(*f),
        _ => true,
    });
    if !all_integral {
        return values;
    }
    values
        .into_iter()
        .map(|cell| match cell {
            Cell::Float(f) => Cell::Int(f as i64),
            other => other,
        })
        .collect()
}

fn is_integral(f: f64) -> bool {
    // `i64::MAX as f64` rounds up to 2^63, which itself overflows.
    f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64
}

/// Convert a workbook cell. Date cells keep their calendar meaning; error
/// cells become null.
fn workbook_cell(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Null,
        Data::String(s) => text_cell(s),
        Data::Int(i) => Cell::Int(*i),
        Data::Float(f) => Cell::Float(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ndt) if ndt.time() == chrono::NaiveTime::MIN => Cell::Date(ndt.date()),
            Some(ndt) => Cell::DateTime(ndt),
            None => Cell::Float(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::text(s.clone()),
    }
}

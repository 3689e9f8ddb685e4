// oppsift - core/export.rs
//
// Delimited-text and workbook export of the final table.
// Core layer: serialises into in-memory buffers; writing them to disk is
// the caller's job.
//
// Both encoders are byte-deterministic: same table in, same bytes out.

use crate::core::model::{Cell, Table};
use crate::util::constants;
use crate::util::error::ExportError;
use chrono::NaiveDate;
use std::fmt::Write as _;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// A named byte stream ready to be offered for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub file_name: &'static str,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

/// Both downloads for a table.
pub fn build_downloads(table: &Table, sheet_name: &str) -> Result<[Download; 2], ExportError> {
    Ok([
        Download {
            file_name: constants::WORKBOOK_FILE_NAME,
            mime: constants::WORKBOOK_MIME,
            bytes: to_workbook(table, sheet_name)?,
        },
        Download {
            file_name: constants::CSV_FILE_NAME,
            mime: constants::CSV_MIME,
            bytes: to_delimited_text(table)?,
        },
    ])
}

// =============================================================================
// Delimited text
// =============================================================================

/// Comma-separated UTF-8 with a header row, `\n` line endings, no index.
///
/// Nulls are empty fields; dates are `YYYY-MM-DD`.
pub fn to_delimited_text(table: &Table) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer
        .write_record(table.column_names())
        .map_err(|source| ExportError::Csv { source })?;

    for row in 0..table.row_count() {
        let record: Vec<String> = table.row(row).map(|cell| cell.to_string()).collect();
        writer
            .write_record(&record)
            .map_err(|source| ExportError::Csv { source })?;
    }

    let bytes = writer.into_inner().map_err(|e| ExportError::Io {
        source: e.into_error(),
    })?;

    tracing::debug!(rows = table.row_count(), bytes = bytes.len(), "CSV export built");
    Ok(bytes)
}

// =============================================================================
// Workbook
// =============================================================================

const CONTENT_TYPES_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
    r#"<Default Extension="xml" ContentType="application/xml"/>"#,
    r#"<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#,
    r#"<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
    r#"<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#,
    r#"</Types>"#,
);

const ROOT_RELS_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>"#,
    r#"</Relationships>"#,
);

const WORKBOOK_RELS_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>"#,
    r#"<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#,
    r#"</Relationships>"#,
);

/// Style 1 formats dates, style 2 date-times.
const STYLES_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
    r#"<numFmts count="2">"#,
    r#"<numFmt numFmtId="164" formatCode="yyyy-mm-dd"/>"#,
    r#"<numFmt numFmtId="165" formatCode="yyyy-mm-dd hh:mm:ss"/>"#,
    r#"</numFmts>"#,
    r#"<fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts>"#,
    r#"<fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills>"#,
    r#"<borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>"#,
    r#"<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>"#,
    r#"<cellXfs count="3">"#,
    r#"<xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>"#,
    r#"<xf numFmtId="164" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/>"#,
    r#"<xf numFmtId="165" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/>"#,
    r#"</cellXfs>"#,
    r#"<cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>"#,
    r#"</styleSheet>"#,
);

const DATE_STYLE: u8 = 1;
const DATETIME_STYLE: u8 = 2;

/// Single-sheet Office Open XML workbook with a header row and no index.
pub fn to_workbook(table: &Table, sheet_name: &str) -> Result<Vec<u8>, ExportError> {
    let sheet_name = sanitize_sheet_name(sheet_name);

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    // Fixed timestamps keep the archive byte-identical between runs.
    let options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default());

    let parts: [(&str, String); 6] = [
        ("[Content_Types].xml", CONTENT_TYPES_XML.to_string()),
        ("_rels/.rels", ROOT_RELS_XML.to_string()),
        ("xl/workbook.xml", workbook_xml(&sheet_name)),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS_XML.to_string()),
        ("xl/styles.xml", STYLES_XML.to_string()),
        ("xl/worksheets/sheet1.xml", worksheet_xml(table)),
    ];

    for (name, content) in &parts {
        zip.start_file(*name, options)
            .map_err(|source| ExportError::Workbook { source })?;
        zip.write_all(content.as_bytes())
            .map_err(|source| ExportError::Io { source })?;
    }

    let bytes = zip
        .finish()
        .map_err(|source| ExportError::Workbook { source })?
        .into_inner();

    tracing::debug!(
        sheet = %sheet_name,
        rows = table.row_count(),
        bytes = bytes.len(),
        "Workbook export built"
    );
    Ok(bytes)
}

/// Make `name` acceptable as a worksheet name.
///
/// Replaces `[ ] : * ? / \` with `_`, trims whitespace, truncates to 31
/// characters and falls back to "Sheet1" when nothing is left.
pub fn sanitize_sheet_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '[' | ']' | ':' | '*' | '?' | '/' | '\\' => '_',
            c => c,
        })
        .take(constants::MAX_SHEET_NAME_CHARS)
        .collect();
    let cleaned = cleaned.trim_end().to_string();
    if cleaned.is_empty() {
        constants::FALLBACK_SHEET_NAME.to_string()
    } else {
        cleaned
    }
}

fn workbook_xml(sheet_name: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            "\n",
            r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" "#,
            r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#,
            r#"<sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets>"#,
            r#"</workbook>"#,
        ),
        xml_escape(sheet_name)
    )
}

fn worksheet_xml(table: &Table) -> String {
    let mut xml = String::from(concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        "\n",
        r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
        r#"<sheetData>"#,
    ));

    xml.push_str(r#"<row r="1">"#);
    for (col, name) in table.column_names().iter().enumerate() {
        push_inline_string(&mut xml, &cell_ref(col, 1), name);
    }
    xml.push_str("</row>");

    for row in 0..table.row_count() {
        let row_number = row + 2;
        let _ = write!(xml, r#"<row r="{row_number}">"#);
        for (col, cell) in table.row(row).enumerate() {
            push_cell(&mut xml, &cell_ref(col, row_number), cell);
        }
        xml.push_str("</row>");
    }

    xml.push_str("</sheetData></worksheet>");
    xml
}

fn push_cell(xml: &mut String, reference: &str, cell: &Cell) {
    // Writing into a String cannot fail.
    match cell {
        Cell::Null => {}
        Cell::Bool(b) => {
            let _ = write!(xml, r#"<c r="{reference}" t="b"><v>{}</v></c>"#, u8::from(*b));
        }
        Cell::Int(i) => {
            let _ = write!(xml, r#"<c r="{reference}"><v>{i}</v></c>"#);
        }
        Cell::Float(x) if x.is_finite() => {
            let _ = write!(xml, r#"<c r="{reference}"><v>{x}</v></c>"#);
        }
        Cell::Float(x) => push_inline_string(xml, reference, &x.to_string()),
        Cell::Text(s) => push_inline_string(xml, reference, s),
        Cell::Date(d) => {
            let serial = excel_serial_days(*d);
            let _ = write!(
                xml,
                r#"<c r="{reference}" s="{DATE_STYLE}"><v>{serial}</v></c>"#
            );
        }
        Cell::DateTime(dt) => {
            let seconds = dt.time().signed_duration_since(chrono::NaiveTime::MIN);
            let serial = excel_serial_days(dt.date()) as f64
                + seconds.num_seconds() as f64 / 86_400.0;
            let _ = write!(
                xml,
                r#"<c r="{reference}" s="{DATETIME_STYLE}"><v>{serial}</v></c>"#
            );
        }
    }
}

fn push_inline_string(xml: &mut String, reference: &str, text: &str) {
    let _ = write!(
        xml,
        r#"<c r="{reference}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
        xml_escape(text)
    );
}

/// Days since the spreadsheet epoch 1899-12-30.
fn excel_serial_days(date: NaiveDate) -> i64 {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or(NaiveDate::MIN);
    date.signed_duration_since(epoch).num_days()
}

/// A1-style reference for a zero-based column and one-based row.
fn cell_ref(col: usize, row: usize) -> String {
    let mut letters = Vec::new();
    let mut n = col + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    format!("{}{row}", String::from_utf8_lossy(&letters))
}

/// Escape XML special characters and drop control characters XML 1.0
/// cannot carry.
fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push(c),
            c if (c as u32) < 0x20 => {}
            c => out.push(c),
        }
    }
    out
}

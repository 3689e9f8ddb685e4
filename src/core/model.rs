// oppsift - core/model.rs
//
// Core data model types. Pure data definitions with no I/O.
//
// A `Table` is the unit that flows through loading, profiling,
// normalisation, projection, filtering and export. Every stage that
// changes a table returns a new value; no stage mutates a table that an
// earlier stage still holds.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::fmt;

// =============================================================================
// Cell
// =============================================================================

/// A single raw cell value. Columns may hold a mix of variants.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(untagged)]
pub enum Cell {
    /// Missing value.
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Pure calendar date (no time of day, no timezone).
    Date(NaiveDate),
    /// Date with time of day, as read from a workbook.
    DateTime(NaiveDateTime),
}

impl Cell {
    /// Build a text cell.
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Returns the text payload for text cells.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the calendar date for date cells only.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Cell::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Numeric view of integer and float cells.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(i) => Some(*i as f64),
            Cell::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Short tag describing the variant, used when inferring column types.
    pub fn kind(&self) -> CellKind {
        match self {
            Cell::Null => CellKind::Null,
            Cell::Bool(_) => CellKind::Bool,
            Cell::Int(_) => CellKind::Int,
            Cell::Float(_) => CellKind::Float,
            Cell::Text(_) => CellKind::Text,
            Cell::Date(_) | Cell::DateTime(_) => CellKind::Temporal,
        }
    }
}

/// Stringified form used for substring matching, profiling and CSV export.
/// Null renders as the empty string.
impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Bool(b) => write!(f, "{b}"),
            Cell::Int(i) => write!(f, "{i}"),
            // Debug keeps the trailing ".0" on integral floats.
            Cell::Float(x) => write!(f, "{x:?}"),
            Cell::Text(s) => f.write_str(s),
            Cell::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Cell::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

/// Variant tag of a `Cell`, ignoring the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellKind {
    Null,
    Bool,
    Int,
    Float,
    Text,
    Temporal,
}

// =============================================================================
// Column / Table
// =============================================================================

/// A named column over the table's shared row index.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Cell>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Cell>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Number of non-null cells.
    pub fn non_null_count(&self) -> usize {
        self.values.iter().filter(|c| !c.is_null()).count()
    }
}

/// An ordered collection of named columns sharing one row index.
///
/// Invariant: every column holds exactly `row_count` cells.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
    row_count: usize,
}

impl Table {
    /// A table with `row_count` rows and no columns yet.
    pub fn with_rows(row_count: usize) -> Self {
        Self {
            columns: Vec::new(),
            row_count,
        }
    }

    /// Build a table from columns. The longest column sets the row count;
    /// shorter columns are padded with nulls.
    pub fn from_columns(columns: Vec<Column>) -> Self {
        let row_count = columns.iter().map(|c| c.values.len()).max().unwrap_or(0);
        let mut table = Self::with_rows(row_count);
        for column in columns {
            table.set_column(column.name, column.values);
        }
        table
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Insert or replace a column. Values are padded with nulls or truncated
    /// to the table's row count.
    pub fn set_column(&mut self, name: impl Into<String>, mut values: Vec<Cell>) {
        let name = name.into();
        if values.len() != self.row_count {
            tracing::debug!(
                column = %name,
                given = values.len(),
                rows = self.row_count,
                "Resizing column to table row count"
            );
            values.resize(self.row_count, Cell::Null);
        }
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.values = values,
            None => self.columns.push(Column { name, values }),
        }
    }

    /// Cell at (`row`, `column`), if both exist.
    pub fn cell(&self, row: usize, column: &str) -> Option<&Cell> {
        self.column(column).and_then(|c| c.values.get(row))
    }

    /// Iterate the cells of one row in column order.
    pub fn row(&self, row: usize) -> impl Iterator<Item = &Cell> + '_ {
        self.columns.iter().filter_map(move |c| c.values.get(row))
    }

    /// New table holding the given rows, in the given order.
    /// Out-of-range indices are ignored.
    pub fn select_rows(&self, indices: &[usize]) -> Table {
        let indices: Vec<usize> = indices
            .iter()
            .copied()
            .filter(|&i| i < self.row_count)
            .collect();
        let columns = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                values: indices.iter().map(|&i| c.values[i].clone()).collect(),
            })
            .collect();
        Table {
            columns,
            row_count: indices.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::from_columns(vec![
            Column::new("Title", vec![Cell::text("a"), Cell::text("b"), Cell::text("c")]),
            Column::new("Amount", vec![Cell::Int(1), Cell::Float(2.5), Cell::Null]),
        ])
    }

    #[test]
    fn test_from_columns_pads_short_columns() {
        let t = Table::from_columns(vec![
            Column::new("A", vec![Cell::Int(1), Cell::Int(2)]),
            Column::new("B", vec![Cell::Int(3)]),
        ]);
        assert_eq!(t.row_count(), 2);
        assert_eq!(t.cell(1, "B"), Some(&Cell::Null));
    }

    #[test]
    fn test_set_column_replaces_existing() {
        let mut t = sample();
        t.set_column("Title", vec![Cell::text("x"); 3]);
        assert_eq!(t.column_count(), 2);
        assert_eq!(t.cell(2, "Title"), Some(&Cell::text("x")));
    }

    #[test]
    fn test_select_rows_reorders_and_ignores_out_of_range() {
        let t = sample().select_rows(&[2, 0, 99]);
        assert_eq!(t.row_count(), 2);
        assert_eq!(t.cell(0, "Title"), Some(&Cell::text("c")));
        assert_eq!(t.cell(1, "Amount"), Some(&Cell::Int(1)));
    }

    #[test]
    fn test_display_formats() {
        assert_eq!(Cell::Null.to_string(), "");
        assert_eq!(Cell::Float(2.0).to_string(), "2.0");
        assert_eq!(Cell::Int(7).to_string(), "7");
        let d = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        assert_eq!(Cell::Date(d).to_string(), "2024-02-01");
    }

    #[test]
    fn test_row_iterates_in_column_order() {
        let t = sample();
        let row: Vec<String> = t.row(1).map(|c| c.to_string()).collect();
        assert_eq!(row, vec!["b", "2.5"]);
    }
}

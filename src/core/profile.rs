// oppsift - core/profile.rs
//
// Structural profile of a loaded table: shape, per-column type tag,
// non-null counts, first-seen example values and numeric summaries.
// The profile is the context handed to the external classifier; it is
// built once per request and never mutated afterwards.

use crate::core::model::{CellKind, Column, Table};
use crate::util::constants;
use serde::Serialize;
use std::collections::HashSet;

/// Profile of a whole table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetProfile {
    pub row_count: usize,
    pub column_count: usize,
    pub columns: Vec<ColumnProfile>,
}

/// Profile of one column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnProfile {
    pub name: String,

    /// Inferred type tag: int64, float64, bool, datetime64, object or empty.
    pub dtype: &'static str,

    pub non_null_count: usize,

    pub missing_count: usize,

    /// Up to `MAX_EXAMPLE_VALUES` distinct stringified values, first-seen order.
    pub example_values: Vec<String>,

    /// Present for int64 and float64 columns only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric_summary: Option<NumericSummary>,
}

/// count/mean/std/min/max over the non-null numeric cells of a column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSummary {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; absent for fewer than two values.
    pub std: Option<f64>,
    pub min: f64,
    pub max: f64,
}

/// Build the profile of `table`. Pure; one pass per column.
pub fn build_profile(table: &Table) -> DatasetProfile {
    let columns: Vec<ColumnProfile> = table.columns().iter().map(profile_column).collect();

    tracing::debug!(
        rows = table.row_count(),
        columns = columns.len(),
        "Dataset profile built"
    );

    DatasetProfile {
        row_count: table.row_count(),
        column_count: table.column_count(),
        columns,
    }
}

fn profile_column(column: &Column) -> ColumnProfile {
    let non_null_count = column.non_null_count();
    let dtype = infer_dtype(column);
    let numeric_summary = match dtype {
        "int64" | "float64" => numeric_summary(column),
        _ => None,
    };

    ColumnProfile {
        name: column.name.clone(),
        dtype,
        non_null_count,
        missing_count: column.values.len() - non_null_count,
        example_values: example_values(column, constants::MAX_EXAMPLE_VALUES),
        numeric_summary,
    }
}

/// Type tag from the kinds of the non-null cells.
fn infer_dtype(column: &Column) -> &'static str {
    let kinds: HashSet<CellKind> = column
        .values
        .iter()
        .filter(|c| !c.is_null())
        .map(|c| c.kind())
        .collect();

    if kinds.is_empty() {
        "empty"
    } else if kinds.iter().all(|k| *k == CellKind::Int) {
        "int64"
    } else if kinds
        .iter()
        .all(|k| matches!(k, CellKind::Int | CellKind::Float))
    {
        "float64"
    } else if kinds.iter().all(|k| *k == CellKind::Bool) {
        "bool"
    } else if kinds.iter().all(|k| *k == CellKind::Temporal) {
        "datetime64"
    } else {
        "object"
    }
}

/// Distinct non-null values in first-seen order, at most `limit`.
///
/// Values are compared by their stringified form, so every cell variant
/// can be sampled.
fn example_values(column: &Column, limit: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut examples = Vec::new();
    for cell in column.values.iter().filter(|c| !c.is_null()) {
        if examples.len() >= limit {
            break;
        }
        let value = cell.to_string();
        if seen.insert(value.clone()) {
            examples.push(value);
        }
    }
    examples
}

fn numeric_summary(column: &Column) -> Option<NumericSummary> {
    let values: Vec<f64> = column
        .values
        .iter()
        .filter_map(|c| c.as_f64())
        .filter(|v| v.is_finite())
        .collect();
    if values.is_empty() {
        return None;
    }

    let count = values.len();
    let mean = values.iter().sum::<f64>() / count as f64;
    let std = (count > 1).then(|| {
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
        var.sqrt()
    });
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    Some(NumericSummary {
        count,
        mean,
        std,
        min,
        max,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::Cell;
    use chrono::NaiveDate;

    fn table() -> Table {
        let d = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        Table::from_columns(vec![
            Column::new(
                "Type",
                vec![
                    Cell::text("Solicitation"),
                    Cell::text("Solicitation"),
                    Cell::Null,
                    Cell::text("Sources Sought"),
                ],
            ),
            Column::new(
                "Award",
                vec![Cell::Int(10), Cell::Float(20.0), Cell::Int(30), Cell::Null],
            ),
            Column::new("Posted", vec![Cell::Date(d), Cell::Null, Cell::Null, Cell::Null]),
            Column::new("Blank", vec![Cell::Null; 4]),
        ])
    }

    #[test]
    fn test_shape_and_counts() {
        let p = build_profile(&table());
        assert_eq!(p.row_count, 4);
        assert_eq!(p.column_count, 4);
        assert_eq!(p.columns[0].non_null_count, 3);
        assert_eq!(p.columns[0].missing_count, 1);
    }

    #[test]
    fn test_dtype_tags() {
        let p = build_profile(&table());
        let tags: Vec<&str> = p.columns.iter().map(|c| c.dtype).collect();
        assert_eq!(tags, vec!["object", "float64", "datetime64", "empty"]);
    }

    #[test]
    fn test_example_values_distinct_first_seen() {
        let p = build_profile(&table());
        assert_eq!(
            p.columns[0].example_values,
            vec!["Solicitation", "Sources Sought"]
        );
        assert!(p.columns[3].example_values.is_empty());
    }

    #[test]
    fn test_example_values_capped() {
        let values = (0..50).map(Cell::Int).collect();
        let t = Table::from_columns(vec![Column::new("N", values)]);
        let p = build_profile(&t);
        assert_eq!(p.columns[0].example_values.len(), constants::MAX_EXAMPLE_VALUES);
        assert_eq!(p.columns[0].example_values[0], "0");
    }

    #[test]
    fn test_numeric_summary() {
        let p = build_profile(&table());
        let s = p.columns[1].numeric_summary.as_ref().unwrap();
        assert_eq!(s.count, 3);
        assert!((s.mean - 20.0).abs() < 1e-9);
        assert!((s.std.unwrap() - 10.0).abs() < 1e-9);
        assert_eq!(s.min, 10.0);
        assert_eq!(s.max, 30.0);
        assert!(p.columns[0].numeric_summary.is_none());
    }

    #[test]
    fn test_profile_serialises_without_empty_summary() {
        let p = build_profile(&table());
        let json = serde_json::to_value(&p).unwrap();
        assert!(json["columns"][0].get("numeric_summary").is_none());
        assert_eq!(json["columns"][1]["numeric_summary"]["count"], 3);
    }
}

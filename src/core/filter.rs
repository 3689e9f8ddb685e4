// oppsift - core/filter.rs
//
// Filter engine over the canonical output table.
// Predicates are AND-combined in list order; an invalid predicate is
// skipped with its reason and never aborts the rest.
// Relative-date windows are computed from a caller-supplied reference
// date so runs are reproducible.
// Core layer: pure logic, no I/O.

use crate::core::dates::{self, DateWindow};
use crate::core::model::{Cell, Table};
use crate::core::plan::FilterPredicate;
use crate::util::error::FilterPredicateError;
use crate::util::logging;
use chrono::NaiveDate;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Operators
// =============================================================================

/// Recognised filter operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    Equals,
    In,
    Contains,
    Between,
    NextDays,
    Today,
    Tomorrow,
    Yesterday,
    ThisWeek,
    LastWeek,
    Last7Days,
}

impl FilterOperator {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::In => "in",
            Self::Contains => "contains",
            Self::Between => "between",
            Self::NextDays => "next_days",
            Self::Today => "today",
            Self::Tomorrow => "tomorrow",
            Self::Yesterday => "yesterday",
            Self::ThisWeek => "this_week",
            Self::LastWeek => "last_week",
            Self::Last7Days => "last_7_days",
        }
    }

    /// Whether the operator compares calendar dates.
    pub fn is_date_based(&self) -> bool {
        !matches!(self, Self::Equals | Self::In | Self::Contains)
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FilterOperator {
    type Err = FilterPredicateError;

    /// Case-insensitive, surrounding whitespace ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let op = match s.trim().to_ascii_lowercase().as_str() {
            "equals" => Self::Equals,
            "in" => Self::In,
            "contains" => Self::Contains,
            "between" => Self::Between,
            "next_days" => Self::NextDays,
            "today" => Self::Today,
            "tomorrow" => Self::Tomorrow,
            "yesterday" => Self::Yesterday,
            "this_week" => Self::ThisWeek,
            "last_week" => Self::LastWeek,
            "last_7_days" => Self::Last7Days,
            _ => {
                return Err(FilterPredicateError::UnknownOperator {
                    operator: s.to_string(),
                })
            }
        };
        Ok(op)
    }
}

// =============================================================================
// Compiled predicates
// =============================================================================

/// A validated predicate ready to evaluate against rows.
#[derive(Debug, Clone, PartialEq)]
enum Condition {
    Equals(Value),
    In(Vec<Value>),
    /// Lowercased needle.
    Contains(String),
    Window(DateWindow),
}

#[derive(Debug, Clone, PartialEq)]
struct CompiledFilter {
    column: String,
    operator: FilterOperator,
    condition: Condition,
}

impl CompiledFilter {
    /// Validate `predicate` against the table's columns and resolve any
    /// relative window against `today`.
    fn compile(
        predicate: &FilterPredicate,
        table: &Table,
        today: NaiveDate,
    ) -> Result<Self, FilterPredicateError> {
        let column = predicate.column.trim();
        if !table.has_column(column) {
            return Err(FilterPredicateError::UnknownColumn {
                column: predicate.column.clone(),
            });
        }
        let operator: FilterOperator = predicate.operator.parse()?;
        let value = &predicate.value;

        let condition = match operator {
            FilterOperator::Equals => {
                if !is_scalar(value) {
                    return Err(invalid(operator, "expected a single value"));
                }
                Condition::Equals(value.clone())
            }
            FilterOperator::In => match value {
                Value::Array(items) => Condition::In(items.clone()),
                _ => return Err(invalid(operator, "expected a list of values")),
            },
            FilterOperator::Contains => match value {
                Value::String(s) => Condition::Contains(s.to_lowercase()),
                Value::Number(n) => Condition::Contains(n.to_string()),
                Value::Bool(b) => Condition::Contains(b.to_string()),
                _ => return Err(invalid(operator, "expected text to search for")),
            },
            FilterOperator::Between => Condition::Window(between_window(value)?),
            FilterOperator::NextDays => {
                let days = day_count(value)?;
                Condition::Window(DateWindow::new(today, dates::shift_days(today, days)))
            }
            FilterOperator::Today => Condition::Window(DateWindow::day(today)),
            FilterOperator::Tomorrow => {
                Condition::Window(DateWindow::day(dates::shift_days(today, 1)))
            }
            FilterOperator::Yesterday => {
                Condition::Window(DateWindow::day(dates::shift_days(today, -1)))
            }
            FilterOperator::ThisWeek => Condition::Window(DateWindow::week_of(today)),
            FilterOperator::LastWeek => Condition::Window(DateWindow::week_before(today)),
            FilterOperator::Last7Days => {
                Condition::Window(DateWindow::new(dates::shift_days(today, -7), today))
            }
        };

        Ok(Self {
            column: column.to_string(),
            operator,
            condition,
        })
    }

    fn matches(&self, cell: &Cell) -> bool {
        match &self.condition {
            Condition::Equals(value) => cell_equals(cell, value),
            Condition::In(values) => values.iter().any(|v| cell_equals(cell, v)),
            Condition::Contains(needle) => cell.to_string().to_lowercase().contains(needle),
            // Date operators see the column re-coerced to calendar dates;
            // null and unparseable cells never match.
            Condition::Window(window) => dates::force_date(cell)
                .as_date()
                .is_some_and(|d| window.contains(d)),
        }
    }

    fn describe(&self) -> String {
        match &self.condition {
            Condition::Window(w) => format!(
                "{} {} [{} .. {}]",
                self.column, self.operator, w.start, w.end
            ),
            Condition::Equals(v) => format!("{} equals {v}", self.column),
            Condition::In(vs) => format!("{} in {} value(s)", self.column, vs.len()),
            Condition::Contains(s) => format!("{} contains '{s}'", self.column),
        }
    }
}

fn invalid(operator: FilterOperator, reason: &str) -> FilterPredicateError {
    FilterPredicateError::InvalidValue {
        operator: operator.name(),
        reason: reason.to_string(),
    }
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

/// `[start, end]` of date-like strings, inclusive.
fn between_window(value: &Value) -> Result<DateWindow, FilterPredicateError> {
    let op = FilterOperator::Between;
    let Value::Array(items) = value else {
        return Err(invalid(op, "expected [start, end]"));
    };
    let [start, end] = items.as_slice() else {
        return Err(invalid(op, "expected exactly two dates"));
    };
    let parse = |v: &Value| v.as_str().and_then(dates::parse_date);
    match (parse(start), parse(end)) {
        (Some(s), Some(e)) => Ok(DateWindow::new(s, e)),
        _ => Err(invalid(op, "start or end is not a date")),
    }
}

/// Non-negative whole number of days, as a JSON number or numeric string.
fn day_count(value: &Value) -> Result<i64, FilterPredicateError> {
    let op = FilterOperator::NextDays;
    let days = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    match days {
        Some(d) if d >= 0 => Ok(d),
        Some(_) => Err(invalid(op, "day count is negative")),
        None => Err(invalid(op, "expected a whole number of days")),
    }
}

/// Equality between a cell and a scalar JSON value.
///
/// Text compares exactly, numbers numerically, booleans by value, and date
/// cells against a date-like string. Null cells never match.
fn cell_equals(cell: &Cell, value: &Value) -> bool {
    match (cell, value) {
        (Cell::Null, _) => false,
        (Cell::Text(s), Value::String(v)) => s == v,
        (Cell::Text(s), Value::Number(n)) => s.trim() == n.to_string(),
        (Cell::Int(_) | Cell::Float(_), Value::Number(n)) => cell.as_f64() == n.as_f64(),
        (Cell::Int(_) | Cell::Float(_), Value::String(v)) => {
            v.trim().parse::<f64>().ok() == cell.as_f64()
        }
        (Cell::Bool(b), Value::Bool(v)) => b == v,
        (Cell::Bool(b), Value::String(v)) => v.trim().eq_ignore_ascii_case(&b.to_string()),
        (Cell::Date(_) | Cell::DateTime(_), Value::String(v)) => match dates::parse_date(v) {
            Some(date) => dates::force_date(cell).as_date() == Some(date),
            None => false,
        },
        _ => false,
    }
}

// =============================================================================
// Engine
// =============================================================================

/// A predicate that was applied, with its effect.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedFilter {
    pub index: usize,
    pub description: String,
    pub rows_before: usize,
    pub rows_after: usize,
}

/// A predicate that was skipped, with the reason.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedFilter {
    pub index: usize,
    pub predicate: FilterPredicate,
    pub error: FilterPredicateError,
}

/// Result of applying a predicate list.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome {
    pub table: Table,
    pub applied: Vec<AppliedFilter>,
    pub skipped: Vec<SkippedFilter>,
}

/// Apply `predicates` conjunctively, in order, to `table`.
///
/// `today` is the reference date for every relative window. An empty list
/// returns the table unchanged.
pub fn apply_filters(
    table: &Table,
    predicates: &[FilterPredicate],
    today: NaiveDate,
) -> FilterOutcome {
    let mut rows: Vec<usize> = (0..table.row_count()).collect();
    let mut applied = Vec::new();
    let mut skipped = Vec::new();

    for (index, predicate) in predicates.iter().enumerate() {
        let filter = match CompiledFilter::compile(predicate, table, today) {
            Ok(f) => f,
            Err(error) => {
                tracing::warn!(
                    index,
                    column = %logging::preview(&predicate.column),
                    operator = %logging::preview(&predicate.operator),
                    error = %error,
                    "Skipping filter predicate"
                );
                skipped.push(SkippedFilter {
                    index,
                    predicate: predicate.clone(),
                    error,
                });
                continue;
            }
        };

        let rows_before = rows.len();
        if let Some(column) = table.column(&filter.column) {
            rows.retain(|&row| filter.matches(&column.values[row]));
        }
        let description = filter.describe();
        tracing::debug!(
            index,
            filter = %description,
            date_based = filter.operator.is_date_based(),
            rows_before,
            rows_after = rows.len(),
            "Applied filter predicate"
        );
        applied.push(AppliedFilter {
            index,
            description,
            rows_before,
            rows_after: rows.len(),
        });
    }

    tracing::info!(
        applied = applied.len(),
        skipped = skipped.len(),
        rows_in = table.row_count(),
        rows_out = rows.len(),
        "Filters applied"
    );

    FilterOutcome {
        table: table.select_rows(&rows),
        applied,
        skipped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::Column;
    use serde_json::json;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Thursday.
    fn today() -> NaiveDate {
        ymd(2024, 2, 15)
    }

    fn table() -> Table {
        Table::from_columns(vec![
            Column::new(
                "Solicitation Number",
                vec![
                    Cell::text("A"),
                    Cell::text("B"),
                    Cell::text("C"),
                    Cell::text("D"),
                    Cell::text("E"),
                ],
            ),
            Column::new(
                "Title",
                vec![
                    Cell::text("Generator Maintenance"),
                    Cell::text("HVAC repair"),
                    Cell::text("generator rental"),
                    Cell::text("Roofing"),
                    Cell::text("Pumps"),
                ],
            ),
            Column::new(
                "Normalized Set Aside",
                vec![
                    Cell::text("SDVOSB"),
                    Cell::text("WOSB"),
                    Cell::text("TOTAL SMALL BUSINESS SET ASIDE"),
                    Cell::text("SDVOSB"),
                    Cell::text("WOSB"),
                ],
            ),
            Column::new(
                "Due Date",
                vec![
                    Cell::Date(ymd(2024, 2, 25)), // today + 10
                    Cell::Date(ymd(2024, 3, 6)),  // today + 20
                    Cell::Date(ymd(2024, 2, 15)),
                    Cell::Null,
                    Cell::Date(ymd(2024, 2, 10)),
                ],
            ),
            Column::new(
                "Amount",
                vec![
                    Cell::Int(100),
                    Cell::Float(250.5),
                    Cell::Int(100),
                    Cell::Null,
                    Cell::Int(7),
                ],
            ),
        ])
    }

    fn ids(outcome: &FilterOutcome) -> Vec<String> {
        outcome
            .table
            .column("Solicitation Number")
            .unwrap()
            .values
            .iter()
            .map(|c| c.to_string())
            .collect()
    }

    fn pred(column: &str, operator: &str, value: Value) -> FilterPredicate {
        FilterPredicate::new(column, operator, value)
    }

    #[test]
    fn test_empty_predicate_list_is_noop() {
        let t = table();
        let out = apply_filters(&t, &[], today());
        assert_eq!(out.table, t);
        assert!(out.applied.is_empty() && out.skipped.is_empty());
    }

    #[test]
    fn test_next_days_window() {
        let out = apply_filters(&table(), &[pred("Due Date", "next_days", json!(14))], today());
        assert_eq!(ids(&out), vec!["A", "C"]);
    }

    #[test]
    fn test_in_combined_with_between() {
        let out = apply_filters(
            &table(),
            &[
                pred("Normalized Set Aside", "in", json!(["SDVOSB", "WOSB"])),
                pred("Due Date", "between", json!(["2024-02-01", "2024-02-15"])),
            ],
            today(),
        );
        assert_eq!(ids(&out), vec!["E"]);
    }

    #[test]
    fn test_between_includes_both_bounds() {
        // E is due on the start date, C on the end date; D has no date.
        let out = apply_filters(
            &table(),
            &[pred("Due Date", "between", json!(["2024-02-10", "2024-02-15"]))],
            today(),
        );
        assert_eq!(ids(&out), vec!["C", "E"]);
        assert_eq!(out.applied[0].rows_after, 2);

        let single_day = apply_filters(
            &table(),
            &[pred("Due Date", "between", json!(["2024-02-15", "2024-02-15"]))],
            today(),
        );
        assert_eq!(ids(&single_day), vec!["C"]);
    }

    #[test]
    fn test_conjunction_narrows() {
        let p1 = pred("Normalized Set Aside", "in", json!(["SDVOSB", "WOSB"]));
        let p2 = pred("Title", "contains", json!("GENERATOR"));
        let one = apply_filters(&table(), &[p1.clone()], today());
        let both = apply_filters(&table(), &[p1, p2], today());
        assert_eq!(ids(&both), vec!["A"]);
        for id in ids(&both) {
            assert!(ids(&one).contains(&id));
        }
    }

    #[test]
    fn test_invalid_predicates_are_skipped() {
        let out = apply_filters(
            &table(),
            &[
                pred("Nope", "equals", json!("x")),
                pred("Title", "fuzzy", json!("x")),
                pred("Title", "in", json!("HVAC repair")),
                pred("Due Date", "between", json!(["2024-02-01"])),
                pred("Due Date", "between", json!(["soon", "later"])),
                pred("Due Date", "next_days", json!("two weeks")),
                pred("Title", "contains", json!("hvac")),
            ],
            today(),
        );
        assert_eq!(out.skipped.len(), 6);
        assert_eq!(out.applied.len(), 1);
        assert_eq!(ids(&out), vec!["B"]);
        assert!(matches!(
            out.skipped[0].error,
            FilterPredicateError::UnknownColumn { .. }
        ));
        assert!(matches!(
            out.skipped[1].error,
            FilterPredicateError::UnknownOperator { .. }
        ));
        assert!(matches!(
            out.skipped[2].error,
            FilterPredicateError::InvalidValue { operator: "in", .. }
        ));
    }

    #[test]
    fn test_operator_names_case_insensitive() {
        assert_eq!(" NEXT_DAYS ".parse::<FilterOperator>(), Ok(FilterOperator::NextDays));
        assert_eq!("Last_7_Days".parse::<FilterOperator>(), Ok(FilterOperator::Last7Days));
        assert!("next days".parse::<FilterOperator>().is_err());
    }

    #[test]
    fn test_single_day_operators() {
        let t = table();
        let run = |operator: &str, on: NaiveDate| {
            ids(&apply_filters(&t, &[pred("Due Date", operator, Value::Null)], on))
        };
        assert_eq!(run("today", today()), vec!["C"]);
        assert_eq!(run("tomorrow", ymd(2024, 2, 14)), vec!["C"]);
        assert_eq!(run("yesterday", ymd(2024, 2, 16)), vec!["C"]);
    }

    #[test]
    fn test_week_operators() {
        let t = table();
        // Week of 2024-02-12..18 holds C (15th); previous week 5..11 holds E (10th).
        let this_week = apply_filters(&t, &[pred("Due Date", "this_week", Value::Null)], today());
        assert_eq!(ids(&this_week), vec!["C"]);
        let last_week = apply_filters(&t, &[pred("Due Date", "last_week", Value::Null)], today());
        assert_eq!(ids(&last_week), vec!["E"]);
        let last_7 = apply_filters(&t, &[pred("Due Date", "last_7_days", Value::Null)], today());
        assert_eq!(ids(&last_7), vec!["C", "E"]);
    }

    #[test]
    fn test_date_filter_on_text_dates() {
        let t = Table::from_columns(vec![
            Column::new("Solicitation Number", vec![Cell::text("X"), Cell::text("Y")]),
            Column::new(
                "Due Date",
                vec![Cell::text("2024-02-16T10:00:00"), Cell::text("TBD")],
            ),
        ]);
        let out = apply_filters(&t, &[pred("Due Date", "next_days", json!(3))], today());
        assert_eq!(ids(&out), vec!["X"]);
    }

    #[test]
    fn test_equals_semantics() {
        let t = table();
        let by_text = apply_filters(
            &t,
            &[pred("Normalized Set Aside", "equals", json!("WOSB"))],
            today(),
        );
        assert_eq!(ids(&by_text), vec!["B", "E"]);
        let by_number = apply_filters(&t, &[pred("Amount", "equals", json!(100))], today());
        assert_eq!(ids(&by_number), vec!["A", "C"]);
        let by_date =
            apply_filters(&t, &[pred("Due Date", "equals", json!("2024-02-10"))], today());
        assert_eq!(ids(&by_date), vec!["E"]);
    }

    #[test]
    fn test_column_name_is_trimmed() {
        let out = apply_filters(&table(), &[pred(" Title ", "contains", json!("roof"))], today());
        assert_eq!(ids(&out), vec!["D"]);
    }
}

// oppsift - core/plan.rs
//
// The classifier contract: the request payload sent out and the structured
// plan parsed back in. Parsing is lenient at the boundary: any missing or
// mistyped field falls back to its empty form so the rest of the pipeline
// never checks for presence.

use crate::core::profile::DatasetProfile;
use crate::util::constants;
use crate::util::error::ClassifierError;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::OnceLock;

// =============================================================================
// Request
// =============================================================================

/// Payload handed to the classifier: the dataset profile and the user's
/// free-text instruction.
#[derive(Debug, Serialize)]
pub struct ClassifierRequest<'a> {
    pub eda: &'a DatasetProfile,
    pub user_request: &'a str,
}

impl<'a> ClassifierRequest<'a> {
    pub fn new(eda: &'a DatasetProfile, user_request: &'a str) -> Self {
        Self { eda, user_request }
    }

    pub fn to_json(&self) -> Result<String, ClassifierError> {
        serde_json::to_string_pretty(self)
            .map_err(|source| ClassifierError::RequestEncoding { source })
    }
}

// =============================================================================
// Plan
// =============================================================================

/// Raw column names the classifier suggests for each role. Empty means
/// "no suggestion".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnSuggestions {
    pub solicitation_number: String,
    pub title: String,
    pub agency: String,
    pub solicitation_date: String,
    pub due_date: String,
    pub opportunity_type_column: String,
    pub set_aside_column: String,
    pub uilink: String,
}

/// One filter as the classifier expressed it. Validated only when applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterPredicate {
    pub column: String,
    pub operator: String,
    pub value: Value,
}

impl FilterPredicate {
    pub fn new(column: impl Into<String>, operator: impl Into<String>, value: Value) -> Self {
        Self {
            column: column.into(),
            operator: operator.into(),
            value,
        }
    }
}

/// Structured plan returned by the classifier, every field defaulted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClassifierPlan {
    pub columns: ColumnSuggestions,
    pub set_aside_patterns: BTreeMap<String, Vec<String>>,
    pub opportunity_type_patterns: BTreeMap<String, Vec<String>>,
    pub filters: Vec<FilterPredicate>,
    pub plan_explanation: String,
}

impl ClassifierPlan {
    /// The all-empty plan with an explanation naming the failure.
    pub fn fallback(reason: &str) -> Self {
        Self {
            plan_explanation: format!("{} ({reason})", constants::FALLBACK_PLAN_EXPLANATION),
            ..Self::default()
        }
    }
}

/// Parse a raw classifier response into a plan.
///
/// Accepts the JSON object on its own or wrapped in a Markdown code fence.
/// Fails only when no JSON object can be recovered at all.
pub fn parse_plan(raw: &str) -> Result<ClassifierPlan, ClassifierError> {
    let value = parse_json_lenient(raw)?;
    let Value::Object(root) = value else {
        return Err(ClassifierError::NotAnObject);
    };

    let columns = match root.get("columns") {
        Some(Value::Object(cols)) => ColumnSuggestions {
            solicitation_number: string_field(cols, "solicitation_number"),
            title: string_field(cols, "title"),
            agency: string_field(cols, "agency"),
            solicitation_date: string_field(cols, "solicitation_date"),
            due_date: string_field(cols, "due_date"),
            opportunity_type_column: string_field(cols, "opportunity_type_column"),
            set_aside_column: string_field(cols, "set_aside_column"),
            uilink: string_field(cols, "uilink"),
        },
        _ => ColumnSuggestions::default(),
    };

    let plan = ClassifierPlan {
        columns,
        set_aside_patterns: pattern_map(root.get("set_aside_patterns")),
        opportunity_type_patterns: pattern_map(root.get("opportunity_type_patterns")),
        filters: filter_list(root.get("filters")),
        plan_explanation: string_field(&root, "plan_explanation"),
    };

    tracing::debug!(
        filters = plan.filters.len(),
        set_aside_categories = plan.set_aside_patterns.len(),
        opportunity_type_categories = plan.opportunity_type_patterns.len(),
        "Classifier plan parsed"
    );
    Ok(plan)
}

/// Parse `raw` as JSON, retrying with the body of a ```json fence.
fn parse_json_lenient(raw: &str) -> Result<Value, ClassifierError> {
    let trimmed = raw.trim();
    match serde_json::from_str(trimmed) {
        Ok(v) => Ok(v),
        Err(first_err) => {
            static FENCE: OnceLock<Regex> = OnceLock::new();
            let fence = FENCE.get_or_init(|| {
                Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)\s*```")
                    .expect("parse_plan: invalid fence regex")
            });
            match fence.captures(trimmed).and_then(|c| c.get(1)) {
                Some(body) => {
                    tracing::debug!("Classifier response wrapped in a code fence");
                    serde_json::from_str(body.as_str())
                        .map_err(|source| ClassifierError::MalformedResponse { source })
                }
                None => Err(ClassifierError::MalformedResponse { source: first_err }),
            }
        }
    }
}

fn string_field(map: &Map<String, Value>, key: &str) -> String {
    match map.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Null) | None => String::new(),
        Some(other) => {
            tracing::debug!(field = key, value = %other, "Ignoring non-string plan field");
            String::new()
        }
    }
}

/// `{label: [patterns]}`, tolerating a bare string in place of a list.
fn pattern_map(value: Option<&Value>) -> BTreeMap<String, Vec<String>> {
    let Some(Value::Object(map)) = value else {
        return BTreeMap::new();
    };
    map.iter()
        .filter_map(|(label, patterns)| {
            let patterns = match patterns {
                Value::String(s) => vec![s.clone()],
                Value::Array(items) => items
                    .iter()
                    .filter_map(|p| p.as_str().map(str::to_string))
                    .collect(),
                _ => return None,
            };
            Some((label.clone(), patterns))
        })
        .collect()
}

/// Filter entries that are objects; anything else is dropped.
fn filter_list(value: Option<&Value>) -> Vec<FilterPredicate> {
    let entries: Vec<&Value> = match value {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(single @ Value::Object(_)) => vec![single],
        _ => return Vec::new(),
    };

    entries
        .into_iter()
        .filter_map(|entry| match entry {
            Value::Object(obj) => Some(FilterPredicate {
                column: string_field(obj, "column"),
                operator: string_field(obj, "operator"),
                value: obj.get("value").cloned().unwrap_or(Value::Null),
            }),
            other => {
                tracing::warn!(entry = %other, "Dropping non-object filter entry");
                None
            }
        })
        .collect()
}

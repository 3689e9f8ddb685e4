// oppsift - core/output.rs
//
// Column role resolution and the canonical output table.
//
// Each role resolves to a raw column name through a fixed chain:
// the classifier's suggestion when the table has that column, else the
// first fallback candidate the table has, else nothing. Unresolved roles
// simply omit their output column.

use crate::core::dates;
use crate::core::model::{Cell, Column, Table};
use crate::core::plan::ColumnSuggestions;
use crate::util::constants;
use std::cmp::Ordering;
use std::collections::HashMap;

// =============================================================================
// Canonical output column names
// =============================================================================

pub const SOLICITATION_NUMBER: &str = "Solicitation Number";
pub const TITLE: &str = "Title";
pub const AGENCY: &str = "Agency";
pub const SOLICITATION_DATE: &str = "Solicitation Date";
pub const OPPORTUNITY_TYPE: &str = "Opportunity Type";
pub const NORMALIZED_SET_ASIDE: &str = "Normalized Set Aside";
pub const DUE_DATE: &str = "Due Date";
pub const UI_LINK: &str = "UiLink";

/// Output columns in emission order.
pub const CANONICAL_COLUMNS: &[&str] = &[
    SOLICITATION_NUMBER,
    TITLE,
    AGENCY,
    SOLICITATION_DATE,
    OPPORTUNITY_TYPE,
    NORMALIZED_SET_ASIDE,
    DUE_DATE,
    UI_LINK,
];

// =============================================================================
// Column roles
// =============================================================================

/// A semantic role a raw column can play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnRole {
    SolicitationNumber,
    Title,
    Agency,
    SolicitationDate,
    DueDate,
    OpportunityTypeSource,
    SetAsideSource,
    UiLink,
}

impl ColumnRole {
    pub const ALL: [ColumnRole; 8] = [
        Self::SolicitationNumber,
        Self::Title,
        Self::Agency,
        Self::SolicitationDate,
        Self::DueDate,
        Self::OpportunityTypeSource,
        Self::SetAsideSource,
        Self::UiLink,
    ];

    /// Candidate raw names tried in order when there is no usable suggestion.
    pub fn fallbacks(&self) -> &'static [&'static str] {
        match self {
            Self::SolicitationNumber => &[
                "SolicitationNumber",
                "NoticeId",
                "NoticeID",
                "Solicitation_Number",
            ],
            Self::Title => &["Title", "Description"],
            Self::Agency => &["Agency", "Office", "Agency/Office"],
            Self::SolicitationDate => &["PostedDate", "NoticeDate", "SolicitationDate"],
            Self::DueDate => &["ResponseDeadLine", "DueDate", "ResponseDate"],
            Self::OpportunityTypeSource => &["Type", "BaseType", "NoticeType"],
            Self::SetAsideSource => &[
                "TypeOfSetAsideDescription",
                "TypeOfSetAside",
                "SetASide",
                "SetAside",
            ],
            Self::UiLink => &["UiLink", "UIlink", "Ui URL"],
        }
    }

    fn suggestion<'a>(&self, s: &'a ColumnSuggestions) -> &'a str {
        match self {
            Self::SolicitationNumber => &s.solicitation_number,
            Self::Title => &s.title,
            Self::Agency => &s.agency,
            Self::SolicitationDate => &s.solicitation_date,
            Self::DueDate => &s.due_date,
            Self::OpportunityTypeSource => &s.opportunity_type_column,
            Self::SetAsideSource => &s.set_aside_column,
            Self::UiLink => &s.uilink,
        }
    }
}

/// Resolved raw column name per role, request-scoped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnRoleMap {
    resolved: HashMap<ColumnRole, String>,
}

impl ColumnRoleMap {
    /// Resolve every role against the columns `table` actually has.
    pub fn resolve(suggestions: &ColumnSuggestions, table: &Table) -> Self {
        let mut resolved = HashMap::new();
        for role in ColumnRole::ALL {
            let suggested = role.suggestion(suggestions).trim();
            let name = if !suggested.is_empty() && table.has_column(suggested) {
                Some(suggested)
            } else {
                if !suggested.is_empty() {
                    tracing::debug!(
                        role = ?role,
                        suggested,
                        "Suggested column not in table, trying fallbacks"
                    );
                }
                role.fallbacks()
                    .iter()
                    .copied()
                    .find(|candidate| table.has_column(candidate))
            };

            match name {
                Some(name) => {
                    tracing::debug!(role = ?role, column = name, "Column role resolved");
                    resolved.insert(role, name.to_string());
                }
                None => tracing::debug!(role = ?role, "Column role unresolved"),
            }
        }
        Self { resolved }
    }

    pub fn get(&self, role: ColumnRole) -> Option<&str> {
        self.resolved.get(&role).map(String::as_str)
    }
}

// =============================================================================
// Output table builder
// =============================================================================

/// Build the canonical output table.
///
/// `table` must already carry the normalised columns. When
/// `drop_unqualified` is set, rows whose normalised set-aside is absent or
/// the catch-all label are removed first. Date columns are coerced to
/// calendar dates, and rows are stably sorted by opportunity type rank,
/// then solicitation date ascending, nulls last.
pub fn build_output_table(table: &Table, roles: &ColumnRoleMap, drop_unqualified: bool) -> Table {
    let kept: Vec<usize> = match table.column(constants::NORMALIZED_SET_ASIDE_COLUMN) {
        Some(set_aside) if drop_unqualified => set_aside
            .values
            .iter()
            .enumerate()
            .filter(|(_, cell)| is_qualified(cell))
            .map(|(i, _)| i)
            .collect(),
        _ => (0..table.row_count()).collect(),
    };
    let rows = table.select_rows(&kept);

    let mut columns: Vec<Column> = Vec::with_capacity(CANONICAL_COLUMNS.len());
    let mut project = |output: &str, source: Option<&str>, as_date: bool| {
        if let Some(column) = source.and_then(|name| rows.column(name)) {
            let values = if as_date {
                dates::force_date_column(&column.values)
            } else {
                column.values.clone()
            };
            columns.push(Column::new(output, values));
        }
    };

    project(SOLICITATION_NUMBER, roles.get(ColumnRole::SolicitationNumber), false);
    project(TITLE, roles.get(ColumnRole::Title), false);
    project(AGENCY, roles.get(ColumnRole::Agency), false);
    project(SOLICITATION_DATE, roles.get(ColumnRole::SolicitationDate), true);
    project(
        OPPORTUNITY_TYPE,
        Some(constants::NORMALIZED_OPPORTUNITY_TYPE_COLUMN),
        false,
    );
    project(
        NORMALIZED_SET_ASIDE,
        Some(constants::NORMALIZED_SET_ASIDE_COLUMN),
        false,
    );
    project(DUE_DATE, roles.get(ColumnRole::DueDate), true);
    project(UI_LINK, roles.get(ColumnRole::UiLink), false);

    let mut output = Table::with_rows(rows.row_count());
    for column in columns {
        output.set_column(column.name, column.values);
    }
    let output = sort_output(output);

    tracing::info!(
        rows_in = table.row_count(),
        rows_out = output.row_count(),
        dropped = table.row_count() - rows.row_count(),
        columns = output.column_count(),
        "Output table built"
    );
    output
}

fn is_qualified(set_aside: &Cell) -> bool {
    match set_aside {
        Cell::Null => false,
        Cell::Text(label) => label != constants::NO_SET_ASIDE,
        _ => true,
    }
}

/// Stable sort by opportunity type rank then solicitation date.
/// Left unsorted when there is no opportunity type column.
fn sort_output(table: Table) -> Table {
    let Some(types) = table.column(OPPORTUNITY_TYPE) else {
        return table;
    };
    let solicitation_dates = table.column(SOLICITATION_DATE);

    let mut order: Vec<usize> = (0..table.row_count()).collect();
    order.sort_by(|&a, &b| {
        let by_type = type_rank(&types.values[a]).cmp(&type_rank(&types.values[b]));
        by_type.then_with(|| match solicitation_dates {
            Some(col) => nulls_last(col.values[a].as_date(), col.values[b].as_date()),
            None => Ordering::Equal,
        })
    });
    table.select_rows(&order)
}

/// Position in the fixed opportunity type order; unknown or null sorts last.
fn type_rank(cell: &Cell) -> usize {
    cell.as_text()
        .and_then(|label| {
            constants::OPPORTUNITY_TYPE_ORDER
                .iter()
                .position(|t| *t == label)
        })
        .unwrap_or(constants::OPPORTUNITY_TYPE_ORDER.len())
}

fn nulls_last<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

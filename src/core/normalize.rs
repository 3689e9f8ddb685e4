// oppsift - core/normalize.rs
//
// Category normaliser: maps free-text cells of one source column into the
// closed label set of a normalisation target, writing the result to a new
// column. One parameterised implementation serves both set-aside and
// opportunity-type classification.

use crate::core::catalog::{NormalizationTarget, PatternDictionary};
use crate::core::model::{Cell, Table};
use crate::util::constants;
use std::collections::BTreeMap;

/// Classifier for one normalisation target over a merged pattern dictionary.
#[derive(Debug, Clone)]
pub struct CategoryNormalizer {
    target: NormalizationTarget,
    dictionary: PatternDictionary,
}

impl CategoryNormalizer {
    /// Build from the target's built-in catalog plus suggested patterns.
    pub fn new(target: NormalizationTarget, suggestions: &BTreeMap<String, Vec<String>>) -> Self {
        Self::with_dictionary(target, target.merged_dictionary(suggestions))
    }

    pub fn with_dictionary(target: NormalizationTarget, dictionary: PatternDictionary) -> Self {
        Self { target, dictionary }
    }

    pub fn target(&self) -> NormalizationTarget {
        self.target
    }

    pub fn dictionary(&self) -> &PatternDictionary {
        &self.dictionary
    }

    /// Label for one cell. `None` means absent and only occurs for
    /// set-aside targets on null or null-like input.
    pub fn classify(&self, cell: &Cell) -> Option<String> {
        let text = cell.to_string().trim().to_lowercase();

        if self.target.null_like_is_absent() && constants::NULL_LIKE_TEXT.contains(&text.as_str())
        {
            return None;
        }

        let label = self
            .dictionary
            .classify(&text)
            .unwrap_or_else(|| self.target.catch_all());
        Some(label.to_string())
    }

    /// Return a copy of `table` with the target's output column added.
    ///
    /// A missing `source_column` yields a column filled with the target's
    /// unknown label.
    pub fn apply(&self, table: &Table, source_column: Option<&str>) -> Table {
        let output = self.target.output_column();
        let values: Vec<Cell> = match source_column.and_then(|name| table.column(name)) {
            Some(column) => column
                .values
                .iter()
                .map(|cell| self.classify(cell).map_or(Cell::Null, Cell::Text))
                .collect(),
            None => {
                tracing::info!(
                    target_column = output,
                    source = source_column.unwrap_or("(unresolved)"),
                    "Source column not found, filling with unknown label"
                );
                let unknown = self.target.unknown().map_or(Cell::Null, Cell::text);
                vec![unknown; table.row_count()]
            }
        };

        let absent = values.iter().filter(|c| c.is_null()).count();
        tracing::debug!(
            target_column = output,
            source = source_column.unwrap_or("(unresolved)"),
            rows = values.len(),
            absent,
            "Normalised column"
        );

        let mut normalized = table.clone();
        normalized.set_column(output, values);
        normalized
    }
}

/// One-shot normalisation: merge the suggestions, classify, add the column.
pub fn normalize(
    table: &Table,
    source_column: Option<&str>,
    target: NormalizationTarget,
    suggestions: &BTreeMap<String, Vec<String>>,
) -> Table {
    CategoryNormalizer::new(target, suggestions).apply(table, source_column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::Column;

    fn set_aside_table(values: &[&str]) -> Table {
        Table::from_columns(vec![Column::new(
            "SetASide",
            values.iter().map(|v| Cell::text(*v)).collect(),
        )])
    }

    fn labels(table: &Table, column: &str) -> Vec<Option<String>> {
        table
            .column(column)
            .unwrap()
            .values
            .iter()
            .map(|c| c.as_text().map(str::to_string))
            .collect()
    }

    #[test]
    fn test_sdvosb_set_aside_text() {
        let t = normalize(
            &set_aside_table(&["SDVOSB Set-Aside"]),
            Some("SetASide"),
            NormalizationTarget::SetAside,
            &BTreeMap::new(),
        );
        assert_eq!(
            labels(&t, constants::NORMALIZED_SET_ASIDE_COLUMN),
            vec![Some("SDVOSB".to_string())]
        );
    }

    #[test]
    fn test_empty_and_null_like_set_aside_are_absent() {
        let mut t = set_aside_table(&["", "  N/A ", "None", "null"]);
        t.set_column("Extra", vec![Cell::Null; 4]);
        let n = CategoryNormalizer::new(NormalizationTarget::SetAside, &BTreeMap::new());
        let out = n.apply(&t, Some("SetASide"));
        assert!(out
            .column(constants::NORMALIZED_SET_ASIDE_COLUMN)
            .unwrap()
            .values
            .iter()
            .all(Cell::is_null));
        assert_eq!(n.classify(&Cell::Null), None);
    }

    #[test]
    fn test_unmatched_text_goes_to_catch_all() {
        let sa = CategoryNormalizer::new(NormalizationTarget::SetAside, &BTreeMap::new());
        assert_eq!(
            sa.classify(&Cell::text("8(a) Sole Source")),
            Some(constants::NO_SET_ASIDE.to_string())
        );
        let ot = CategoryNormalizer::new(NormalizationTarget::OpportunityType, &BTreeMap::new());
        assert_eq!(
            ot.classify(&Cell::text("Award Notice")),
            Some("Other".to_string())
        );
    }

    #[test]
    fn test_opportunity_type_null_like_is_other() {
        let ot = CategoryNormalizer::new(NormalizationTarget::OpportunityType, &BTreeMap::new());
        assert_eq!(ot.classify(&Cell::text("")), Some("Other".to_string()));
        assert_eq!(ot.classify(&Cell::Null), Some("Other".to_string()));
        assert_eq!(ot.classify(&Cell::text("n/a")), Some("Other".to_string()));
    }

    #[test]
    fn test_opportunity_type_specific_before_general() {
        let ot = CategoryNormalizer::new(NormalizationTarget::OpportunityType, &BTreeMap::new());
        assert_eq!(
            ot.classify(&Cell::text("Presolicitation")),
            Some("Presolicitation".to_string())
        );
        assert_eq!(
            ot.classify(&Cell::text("Combined Synopsis/Solicitation")),
            Some("Solicitation".to_string())
        );
        assert_eq!(
            ot.classify(&Cell::text("Sources Sought")),
            Some("Sources Sought".to_string())
        );
    }

    #[test]
    fn test_classification_is_total_for_non_null_like_text() {
        let sa = CategoryNormalizer::new(NormalizationTarget::SetAside, &BTreeMap::new());
        let allowed = sa.dictionary().labels();
        for text in ["x", "WOSB", "Total Small Business Set-Aside (FAR 19.5)", "42"] {
            let label = sa.classify(&Cell::text(text)).unwrap();
            assert!(
                allowed.contains(&label.as_str()),
                "'{text}' classified outside the label set: {label}"
            );
        }
    }

    #[test]
    fn test_suggested_patterns_extend_matching() {
        let mut suggestions = BTreeMap::new();
        suggestions.insert("WOSB".to_string(), vec!["women-owned".to_string()]);
        let t = normalize(
            &set_aside_table(&["Women-Owned Program"]),
            Some("SetASide"),
            NormalizationTarget::SetAside,
            &suggestions,
        );
        assert_eq!(
            labels(&t, constants::NORMALIZED_SET_ASIDE_COLUMN),
            vec![Some("WOSB".to_string())]
        );
    }

    #[test]
    fn test_missing_source_column_fills_unknown() {
        let t = set_aside_table(&["SDVOSB", "WOSB"]);

        let sa = normalize(&t, Some("Nope"), NormalizationTarget::SetAside, &BTreeMap::new());
        assert_eq!(labels(&sa, constants::NORMALIZED_SET_ASIDE_COLUMN), vec![None, None]);

        let ot = normalize(&t, None, NormalizationTarget::OpportunityType, &BTreeMap::new());
        assert_eq!(
            labels(&ot, constants::NORMALIZED_OPPORTUNITY_TYPE_COLUMN),
            vec![Some("Other".to_string()), Some("Other".to_string())]
        );
    }

    #[test]
    fn test_input_table_is_not_modified() {
        let t = set_aside_table(&["SDVOSB"]);
        let before = t.clone();
        let _ = normalize(&t, Some("SetASide"), NormalizationTarget::SetAside, &BTreeMap::new());
        assert_eq!(t, before);
    }
}

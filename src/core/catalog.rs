// oppsift - core/catalog.rs
//
// Category pattern catalogs: built-in definitions embedded at compile time,
// validated into ordered pattern dictionaries, then extended with the
// classifier's suggested patterns.
//
// Core layer: accepts TOML strings, never touches the filesystem.

use crate::util::constants;
use crate::util::error::CatalogError;
use serde::Deserialize;
use std::collections::BTreeMap;

// =============================================================================
// TOML deserialization structures (raw input)
// =============================================================================

/// Raw catalog definition as deserialized from an embedded .toml file.
#[derive(Debug, Deserialize)]
pub struct CatalogDefinition {
    pub catalog: CatalogMeta,
    #[serde(default, rename = "category")]
    pub categories: Vec<CategoryDef>,
}

#[derive(Debug, Deserialize)]
pub struct CatalogMeta {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CategoryDef {
    pub label: String,
    #[serde(default)]
    pub patterns: Vec<String>,
}

// =============================================================================
// Pattern dictionary (runtime representation)
// =============================================================================

/// One category label with its lowercase substring patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternBucket {
    pub label: String,
    pub patterns: Vec<String>,
}

/// Ordered mapping from category label to patterns.
///
/// Classification scans buckets in order and returns the first whose
/// pattern occurs in the text. Built-in buckets keep their catalog order;
/// buckets introduced by suggestions follow, sorted by label.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PatternDictionary {
    buckets: Vec<PatternBucket>,
}

impl PatternDictionary {
    pub fn buckets(&self) -> &[PatternBucket] {
        &self.buckets
    }

    pub fn labels(&self) -> Vec<&str> {
        self.buckets.iter().map(|b| b.label.as_str()).collect()
    }

    /// Patterns of the bucket labelled `label` (exact match).
    pub fn patterns(&self, label: &str) -> Option<&[String]> {
        self.buckets
            .iter()
            .find(|b| b.label == label)
            .map(|b| b.patterns.as_slice())
    }

    /// Append suggested patterns per category, never replacing existing ones.
    ///
    /// Keys are trimmed and matched to existing labels case-insensitively;
    /// unknown keys become new buckets. Empty keys, empty lists and empty
    /// patterns are ignored.
    pub fn merge_suggestions(&mut self, suggestions: &BTreeMap<String, Vec<String>>) {
        for (raw_label, raw_patterns) in suggestions {
            let label = raw_label.trim();
            let patterns: Vec<String> = raw_patterns
                .iter()
                .filter_map(|p| normalise_pattern(p))
                .collect();
            if label.is_empty() || patterns.is_empty() {
                continue;
            }

            match self
                .buckets
                .iter_mut()
                .find(|b| b.label.eq_ignore_ascii_case(label))
            {
                Some(bucket) => {
                    tracing::debug!(
                        category = %bucket.label,
                        added = patterns.len(),
                        "Merged suggested patterns"
                    );
                    bucket.patterns.extend(patterns);
                }
                None => {
                    tracing::debug!(
                        category = label,
                        patterns = patterns.len(),
                        "Added suggested category"
                    );
                    self.buckets.push(PatternBucket {
                        label: label.to_string(),
                        patterns,
                    });
                }
            }
        }
    }

    /// First bucket label with a pattern contained in `text`.
    ///
    /// `text` must already be trimmed and lowercased.
    pub fn classify(&self, text: &str) -> Option<&str> {
        self.buckets
            .iter()
            .find(|b| b.patterns.iter().any(|p| text.contains(p.as_str())))
            .map(|b| b.label.as_str())
    }
}

/// Trim and lowercase a pattern; empty patterns are dropped.
fn normalise_pattern(raw: &str) -> Option<String> {
    let p = raw.trim().to_lowercase();
    (!p.is_empty()).then_some(p)
}

// =============================================================================
// Normalisation targets
// =============================================================================

/// A categorical field the pipeline normalises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NormalizationTarget {
    SetAside,
    OpportunityType,
}

impl NormalizationTarget {
    /// Name of the column the normaliser writes.
    pub fn output_column(&self) -> &'static str {
        match self {
            Self::SetAside => constants::NORMALIZED_SET_ASIDE_COLUMN,
            Self::OpportunityType => constants::NORMALIZED_OPPORTUNITY_TYPE_COLUMN,
        }
    }

    /// Label for non-empty text that matches no pattern.
    pub fn catch_all(&self) -> &'static str {
        match self {
            Self::SetAside => constants::NO_SET_ASIDE,
            Self::OpportunityType => constants::OTHER_OPPORTUNITY_TYPE,
        }
    }

    /// Label used when there is nothing to classify: `None` (absent) for
    /// set-asides, "Other" for opportunity types.
    pub fn unknown(&self) -> Option<&'static str> {
        match self {
            Self::SetAside => None,
            Self::OpportunityType => Some(constants::OTHER_OPPORTUNITY_TYPE),
        }
    }

    /// Whether empty and null-like text ("none", "n/a", ...) means absent.
    pub fn null_like_is_absent(&self) -> bool {
        matches!(self, Self::SetAside)
    }

    /// Embedded TOML source of the built-in catalog.
    fn builtin_source(&self) -> (&'static str, &'static str) {
        match self {
            Self::SetAside => (
                "set_aside.toml",
                include_str!("../../catalogs/set_aside.toml"),
            ),
            Self::OpportunityType => (
                "opportunity_type.toml",
                include_str!("../../catalogs/opportunity_type.toml"),
            ),
        }
    }

    /// Built-in pattern dictionary for this target.
    ///
    /// A broken embedded catalog is a bug; it is logged and an empty
    /// dictionary is returned so classification still falls back to the
    /// catch-all label.
    pub fn builtin_dictionary(&self) -> PatternDictionary {
        let (file_name, content) = self.builtin_source();
        let source_name = format!("<builtin>/{file_name}");
        match parse_catalog_toml(content, &source_name).and_then(validate_and_build) {
            Ok(dictionary) => dictionary,
            Err(e) => {
                tracing::error!(file = file_name, error = %e, "Failed to load built-in catalog");
                PatternDictionary::default()
            }
        }
    }

    /// Built-in dictionary extended with the classifier's suggestions.
    pub fn merged_dictionary(
        &self,
        suggestions: &BTreeMap<String, Vec<String>>,
    ) -> PatternDictionary {
        let mut dictionary = self.builtin_dictionary();
        dictionary.merge_suggestions(suggestions);
        dictionary
    }
}

// =============================================================================
// Catalog validation
// =============================================================================

/// Parse a TOML string into a `CatalogDefinition`.
///
/// `source_name` is used for error messages only.
pub fn parse_catalog_toml(
    toml_content: &str,
    source_name: &str,
) -> Result<CatalogDefinition, CatalogError> {
    toml::from_str(toml_content).map_err(|e| CatalogError::TomlParse {
        source_name: source_name.to_string(),
        source: e,
    })
}

/// Validate a definition and build its ordered pattern dictionary.
///
/// Validates:
/// - the catalog id and every category label are non-empty
/// - category labels are unique (case-insensitive)
pub fn validate_and_build(def: CatalogDefinition) -> Result<PatternDictionary, CatalogError> {
    let id = def.catalog.id.trim().to_string();
    if id.is_empty() {
        return Err(CatalogError::MissingField {
            catalog_id: "(empty)".to_string(),
            field: "catalog.id",
        });
    }

    let mut buckets: Vec<PatternBucket> = Vec::with_capacity(def.categories.len());
    for category in def.categories {
        let label = category.label.trim().to_string();
        if label.is_empty() {
            return Err(CatalogError::MissingField {
                catalog_id: id,
                field: "category.label",
            });
        }
        if buckets.iter().any(|b| b.label.eq_ignore_ascii_case(&label)) {
            return Err(CatalogError::DuplicateCategory {
                catalog_id: id,
                label,
            });
        }
        buckets.push(PatternBucket {
            label,
            patterns: category
                .patterns
                .iter()
                .filter_map(|p| normalise_pattern(p))
                .collect(),
        });
    }

    tracing::debug!(catalog = %id, categories = buckets.len(), "Catalog loaded");
    Ok(PatternDictionary { buckets })
}

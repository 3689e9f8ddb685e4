// oppsift - util/constants.rs
//
// Single source of truth for all named constants, limits, and defaults.

// =============================================================================
// Application metadata
// =============================================================================

/// Application display name.
pub const APP_NAME: &str = "oppsift";

/// Application identifier used for config/data directories.
pub const APP_ID: &str = "oppsift";

/// Current application version (updated by release script).
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Loading
// =============================================================================

/// Cell texts treated as missing values when reading delimited text.
/// Compared after trimming, case-sensitively.
pub const NULL_TOKENS: &[&str] = &[
    "", "#N/A", "N/A", "NA", "NULL", "NaN", "n/a", "nan", "null", "None", "-NaN", "<NA>",
];

/// Prefix for header cells that are empty.
pub const UNNAMED_COLUMN_PREFIX: &str = "Unnamed: ";

// =============================================================================
// Profiling
// =============================================================================

/// Maximum number of distinct example values kept per column profile.
pub const MAX_EXAMPLE_VALUES: usize = 10;

// =============================================================================
// Reference clock
// =============================================================================

/// UTC offset of the reference timezone used for every relative-date filter.
///
/// Africa/Lagos observes West Africa Time (UTC+01:00) all year with no
/// daylight saving, so a fixed offset reproduces it exactly.
pub const REFERENCE_UTC_OFFSET_SECS: i64 = 3_600;

/// Name of the reference timezone, for logs and summaries.
pub const REFERENCE_TIMEZONE_NAME: &str = "Africa/Lagos";

// =============================================================================
// Output table
// =============================================================================

/// Column holding the normalised opportunity type before projection.
pub const NORMALIZED_OPPORTUNITY_TYPE_COLUMN: &str = "Normalized_Opportunity_Type";

/// Column holding the normalised set-aside before projection.
pub const NORMALIZED_SET_ASIDE_COLUMN: &str = "Normalized_Set_Aside";

/// Catch-all set-aside label; rows carrying it are unqualified.
pub const NO_SET_ASIDE: &str = "NO SET-ASIDE";

/// Catch-all opportunity type label.
pub const OTHER_OPPORTUNITY_TYPE: &str = "Other";

/// Fixed sort order of opportunity types in the output table.
pub const OPPORTUNITY_TYPE_ORDER: &[&str] =
    &["Solicitation", "Presolicitation", "Sources Sought", "Other"];

// =============================================================================
// Export
// =============================================================================

/// Maximum worksheet name length accepted by the workbook format.
pub const MAX_SHEET_NAME_CHARS: usize = 31;

/// Default worksheet name for the exported workbook.
pub const DEFAULT_SHEET_NAME: &str = "Filtered";

/// Sheet name used when the requested one is empty after sanitising.
pub const FALLBACK_SHEET_NAME: &str = "Sheet1";

/// Download file name of the workbook export.
pub const WORKBOOK_FILE_NAME: &str = "Filtered_Results.xlsx";

/// Download file name of the delimited-text export.
pub const CSV_FILE_NAME: &str = "Filtered_Results.csv";

/// MIME type of the workbook export.
pub const WORKBOOK_MIME: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// MIME type of the delimited-text export.
pub const CSV_MIME: &str = "text/csv";

// =============================================================================
// Classifier
// =============================================================================

/// Maximum size of a classifier response read from disk.
pub const MAX_PLAN_FILE_SIZE: u64 = 1024 * 1024; // 1 MB

/// Explanation shown when the classifier returned nothing usable.
pub const FALLBACK_PLAN_EXPLANATION: &str =
    "The AI planning step failed; built-in patterns were used and no filters were applied.";

// =============================================================================
// Logging
// =============================================================================

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Maximum length of a cell value included in debug output.
pub const DEBUG_MAX_VALUE_PREVIEW: usize = 80;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.toml";

// =============================================================================
// Normalisation
// =============================================================================

/// Lowercased, trimmed set-aside texts that mean "no value" rather than
/// "no set-aside".
pub const NULL_LIKE_TEXT: &[&str] = &["", "none", "n/a", "na", "null"];

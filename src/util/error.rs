// oppsift - util/error.rs
//
// Typed error hierarchy with context-preserving error chains.
// No string-based error propagation across module seams.
// All errors preserve the causal chain for diagnostic logging.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Top-level error type for all oppsift operations.
/// Errors are categorised by the subsystem that produced them.
#[derive(Debug)]
pub enum OppsiftError {
    /// The uploaded dataset could not be loaded.
    Load(LoadError),

    /// The classifier call failed. Only fatal when surfaced outside a
    /// pipeline run; the pipeline itself recovers from it.
    Classifier(ClassifierError),

    /// Export operation failed.
    Export(ExportError),

    /// Configuration loading failed.
    Config(ConfigError),

    /// I/O error with path context.
    Io {
        path: PathBuf,
        operation: &'static str,
        source: io::Error,
    },
}

impl fmt::Display for OppsiftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load(e) => write!(f, "Load error: {e}"),
            Self::Classifier(e) => write!(f, "Classifier error: {e}"),
            Self::Export(e) => write!(f, "Export error: {e}"),
            Self::Config(e) => write!(f, "Configuration error: {e}"),
            Self::Io {
                path,
                operation,
                source,
            } => write!(
                f,
                "I/O error during {operation} on '{}': {source}",
                path.display()
            ),
        }
    }
}

impl std::error::Error for OppsiftError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Load(e) => Some(e),
            Self::Classifier(e) => Some(e),
            Self::Export(e) => Some(e),
            Self::Config(e) => Some(e),
            Self::Io { source, .. } => Some(source),
        }
    }
}

// ---------------------------------------------------------------------------
// Load errors
// ---------------------------------------------------------------------------

/// Errors raised while turning an uploaded file into a table.
#[derive(Debug)]
pub enum LoadError {
    /// The file extension is not one of csv, xlsx, xls.
    UnsupportedExtension { file_name: String, extension: String },

    /// Neither UTF-8 nor the Latin-1 fallback could decode the text.
    Encoding { file_name: String },

    /// Delimited text could not be parsed.
    Csv {
        file_name: String,
        source: csv::Error,
    },

    /// The binary workbook is malformed.
    Workbook {
        file_name: String,
        source: calamine::Error,
    },

    /// The workbook contains no worksheet to read.
    NoWorksheet { file_name: String },
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedExtension {
                file_name,
                extension,
            } => write!(
                f,
                "Unsupported file type '{extension}' for '{file_name}'. \
                 Please upload CSV or Excel (.xlsx/.xls)."
            ),
            Self::Encoding { file_name } => {
                write!(f, "'{file_name}': text is neither UTF-8 nor Latin-1")
            }
            Self::Csv { file_name, source } => {
                write!(f, "'{file_name}': cannot parse delimited text: {source}")
            }
            Self::Workbook { file_name, source } => {
                write!(f, "'{file_name}': malformed workbook: {source}")
            }
            Self::NoWorksheet { file_name } => {
                write!(f, "'{file_name}': workbook contains no worksheets")
            }
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Csv { source, .. } => Some(source),
            Self::Workbook { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<LoadError> for OppsiftError {
    fn from(e: LoadError) -> Self {
        Self::Load(e)
    }
}

// ---------------------------------------------------------------------------
// Classifier errors
// ---------------------------------------------------------------------------

/// Errors from the external classifier call or from parsing its response.
#[derive(Debug)]
pub enum ClassifierError {
    /// No classifier is configured, or it refused the request.
    Unavailable { reason: String },

    /// A recorded response could not be read.
    Io { path: PathBuf, source: io::Error },

    /// A recorded response exceeds the maximum accepted size.
    ResponseTooLarge {
        path: PathBuf,
        size: u64,
        max_size: u64,
    },

    /// The request payload could not be serialised.
    RequestEncoding { source: serde_json::Error },

    /// The response is not valid JSON.
    MalformedResponse { source: serde_json::Error },

    /// The response is valid JSON but not an object.
    NotAnObject,
}

impl fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { reason } => write!(f, "classifier unavailable: {reason}"),
            Self::Io { path, source } => {
                write!(f, "cannot read response '{}': {source}", path.display())
            }
            Self::ResponseTooLarge {
                path,
                size,
                max_size,
            } => write!(
                f,
                "response '{}' is {size} bytes, exceeds maximum of {max_size} bytes",
                path.display()
            ),
            Self::RequestEncoding { source } => {
                write!(f, "cannot encode classifier request: {source}")
            }
            Self::MalformedResponse { source } => {
                write!(f, "response is not valid JSON: {source}")
            }
            Self::NotAnObject => write!(f, "response JSON is not an object"),
        }
    }
}

impl std::error::Error for ClassifierError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::RequestEncoding { source } => Some(source),
            Self::MalformedResponse { source } => Some(source),
            _ => None,
        }
    }
}

impl From<ClassifierError> for OppsiftError {
    fn from(e: ClassifierError) -> Self {
        Self::Classifier(e)
    }
}

// ---------------------------------------------------------------------------
// Catalog errors
// ---------------------------------------------------------------------------

/// Errors in a category pattern catalog definition.
#[derive(Debug)]
pub enum CatalogError {
    /// TOML could not be parsed.
    TomlParse {
        source_name: String,
        source: toml::de::Error,
    },

    /// A required field is missing or empty.
    MissingField {
        catalog_id: String,
        field: &'static str,
    },

    /// Two categories share a label (compared case-insensitively).
    DuplicateCategory { catalog_id: String, label: String },
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TomlParse {
                source_name,
                source,
            } => write!(f, "Failed to parse catalog '{source_name}': {source}"),
            Self::MissingField { catalog_id, field } => {
                write!(f, "Catalog '{catalog_id}': missing required field '{field}'")
            }
            Self::DuplicateCategory { catalog_id, label } => {
                write!(f, "Catalog '{catalog_id}': duplicate category '{label}'")
            }
        }
    }
}

impl std::error::Error for CatalogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TomlParse { source, .. } => Some(source),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Filter predicate errors
// ---------------------------------------------------------------------------

/// Why a single filter predicate was skipped. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterPredicateError {
    /// The target column is not one of the output table's columns.
    UnknownColumn { column: String },

    /// The operator name is not recognised.
    UnknownOperator { operator: String },

    /// The operator is known but its value has the wrong shape.
    InvalidValue {
        operator: &'static str,
        reason: String,
    },
}

impl fmt::Display for FilterPredicateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownColumn { column } => {
                write!(f, "column '{column}' is not in the output table")
            }
            Self::UnknownOperator { operator } => {
                write!(f, "operator '{operator}' is not recognised")
            }
            Self::InvalidValue { operator, reason } => {
                write!(f, "invalid value for '{operator}': {reason}")
            }
        }
    }
}

impl std::error::Error for FilterPredicateError {}

// ---------------------------------------------------------------------------
// Export errors
// ---------------------------------------------------------------------------

/// Errors related to export operations.
#[derive(Debug)]
pub enum ExportError {
    /// CSV serialisation error.
    Csv { source: csv::Error },

    /// Workbook container error.
    Workbook { source: zip::result::ZipError },

    /// I/O error writing into the in-memory buffer.
    Io { source: io::Error },
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Csv { source } => write!(f, "CSV export error: {source}"),
            Self::Workbook { source } => write!(f, "workbook export error: {source}"),
            Self::Io { source } => write!(f, "export I/O error: {source}"),
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Csv { source } => Some(source),
            Self::Workbook { source } => Some(source),
            Self::Io { source } => Some(source),
        }
    }
}

impl From<ExportError> for OppsiftError {
    fn from(e: ExportError) -> Self {
        Self::Export(e)
    }
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

/// Errors related to configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    /// TOML parsing failed.
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// I/O error reading config file.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TomlParse { path, source } => {
                write!(f, "Config parse error '{}': {source}", path.display())
            }
            Self::Io { path, source } => {
                write!(f, "Config I/O error '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TomlParse { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
        }
    }
}

impl From<ConfigError> for OppsiftError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

/// Convenience type alias for oppsift results.
pub type Result<T> = std::result::Result<T, OppsiftError>;

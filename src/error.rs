/*!
 * Error handling for practice analytics operations
 *
 * Provides detailed error types with context, suggestions, and recovery guidance.
 * Most data problems are never surfaced as errors at all: joins fall back to
 * placeholders, amounts coerce to zero and bad dates drop out of windows. What
 * remains here are the conditions a caller can log or report.
 */

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use serde::{Serialize, Deserialize};

/// Practice analytics result type
pub type Result<T> = std::result::Result<T, PracticeError>;

/// Error types with context and suggestions
#[derive(Error, Debug)]
pub enum PracticeError {
    /// File I/O errors with context
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
        context: ErrorContext,
    },

    /// CSV parsing errors with location information
    #[error("CSV parsing error at line {line:?}: {message}")]
    CsvParse {
        message: String,
        line: Option<usize>,
        column: Option<String>,
        context: ErrorContext,
    },

    /// Row-level validation errors
    #[error("Data validation error: {message}")]
    DataValidation {
        message: String,
        field: Option<String>,
        value: Option<String>,
        context: ErrorContext,
    },

    /// Resource file missing
    #[error("Resource not found: {path}")]
    ResourceNotFound {
        path: PathBuf,
        suggestion: String,
    },

    /// Header row does not carry the columns a resource needs
    #[error("Schema mismatch in {resource}: {message}")]
    SchemaMismatch {
        resource: String,
        message: String,
        missing_columns: Vec<String>,
    },

    /// Date parsing errors with format hints
    #[error("Date parsing error: {message}")]
    DateParse {
        message: String,
        value: String,
        expected_format: String,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        suggestion: Option<String>,
    },

    /// Export errors
    #[error("Export error: {message}")]
    Export {
        message: String,
        format: ExportFormat,
        suggestion: Option<String>,
    },

    /// Generic errors with custom message
    #[error("{message}")]
    Custom {
        message: String,
        suggestion: Option<String>,
    },
}

/// Error context providing additional information
#[derive(Debug, Default, Clone)]
pub struct ErrorContext {
    pub file_path: Option<PathBuf>,
    pub line_number: Option<usize>,
    pub column_name: Option<String>,
    pub record_id: Option<String>,
}

/// Output format for exported views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    JsonLines,
    Csv,
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Json => write!(f, "JSON"),
            ExportFormat::JsonLines => write!(f, "JSON Lines"),
            ExportFormat::Csv => write!(f, "CSV"),
        }
    }
}

impl PracticeError {
    /// Create a resource not found error with a helpful suggestion
    pub fn resource_not_found(path: PathBuf) -> Self {
        let file_name = path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        let suggestion = if crate::constants::RESOURCE_FILE_NAMES.contains(&file_name.as_str()) {
            format!(
                "Check that '{}' exists in the data directory. The practice export is expected to contain \
                {}.",
                path.display(),
                crate::constants::RESOURCE_FILE_NAMES.join(", ")
            )
        } else {
            format!(
                "Check if the file exists at '{}'. Make sure the path is correct and you have read permissions.",
                path.display()
            )
        };

        Self::ResourceNotFound { path, suggestion }
    }

    /// Create a schema mismatch error listing the missing columns
    pub fn missing_columns(resource: &str, missing: Vec<String>) -> Self {
        Self::SchemaMismatch {
            resource: resource.to_string(),
            message: format!("missing required column(s): {}", missing.join(", ")),
            missing_columns: missing,
        }
    }

    /// Create a validation error for a required field that is blank or absent
    pub fn missing_field(field: &str, line_number: usize) -> Self {
        Self::DataValidation {
            message: format!("Missing required field: {}", field),
            field: Some(field.to_string()),
            value: None,
            context: ErrorContext {
                line_number: Some(line_number),
                ..Default::default()
            },
        }
    }

    /// Create a date parsing error with format information
    pub fn date_parse_with_format(value: &str, expected_format: &str) -> Self {
        Self::DateParse {
            message: format!("Cannot parse '{}' as date", value),
            value: value.to_string(),
            expected_format: expected_format.to_string(),
        }
    }

    /// Attach a file path to errors that carry a context
    pub fn with_path(mut self, path: PathBuf) -> Self {
        match &mut self {
            Self::Io { context, .. }
            | Self::CsvParse { context, .. }
            | Self::DataValidation { context, .. } => {
                context.file_path = Some(path);
            }
            _ => {}
        }
        self
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            Self::ResourceNotFound { suggestion, .. } => {
                format!("{}\n\nSuggestion: {}", self, suggestion)
            }
            Self::SchemaMismatch { missing_columns, .. } => {
                format!("{}\n\nAdd the missing header(s): {}", self, missing_columns.join(", "))
            }
            Self::DateParse { expected_format, .. } => {
                format!("{}\n\nExpected format: {}", self, expected_format)
            }
            Self::Configuration { suggestion: Some(sug), .. }
            | Self::Export { suggestion: Some(sug), .. }
            | Self::Custom { suggestion: Some(sug), .. } => {
                format!("{}\n\nSuggestion: {}", self, sug)
            }
            _ => self.to_string(),
        }
    }
}

// Convenience conversions
impl From<std::io::Error> for PracticeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            source: err,
            context: ErrorContext::default(),
        }
    }
}

impl From<csv::Error> for PracticeError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|pos| pos.line() as usize);

        Self::CsvParse {
            message: err.to_string(),
            line,
            column: None,
            context: ErrorContext {
                line_number: line,
                ..Default::default()
            },
        }
    }
}

impl From<serde_json::Error> for PracticeError {
    fn from(err: serde_json::Error) -> Self {
        PracticeError::Export {
            message: err.to_string(),
            format: ExportFormat::Json,
            suggestion: Some("Check if the data is serializable to JSON.".to_string()),
        }
    }
}

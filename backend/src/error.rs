//! Error types for the hookmap mapping pipeline.
//!
//! One enum per layer:
//!
//! - [`PathError`] - path resolution failures (swallowed by [`crate::path::resolve`])
//! - [`TransformError`] - unparsable transformation input (swallowed by `apply`)
//! - [`RecordError`] - a row that cannot be turned into a record
//! - [`TemplateError`] - template registry errors
//! - [`BatchError`] - top-level batch errors, the only ones that abort a batch
//! - [`ExportError`] - tabular export errors
//! - [`ServerError`] - HTTP layer errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// Path Resolution Errors
// =============================================================================

/// Why a path could not be walked to the end.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PathError {
    /// Object has no such key.
    #[error("missing key '{0}'")]
    MissingKey(String),

    /// Array index past the end.
    #[error("index {index} out of range (length {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// Segment does not apply to the value it was used on.
    #[error("cannot apply segment '{segment}' to {found}")]
    TypeMismatch { segment: String, found: &'static str },

    /// Wildcard base did not resolve to an array.
    #[error("wildcard base is {0}, not an array")]
    NotAnArray(&'static str),
}

// =============================================================================
// Transformation Errors
// =============================================================================

/// Input a transformation could not interpret.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransformError {
    /// Value does not match the date format.
    #[error("cannot parse '{value}' as a date with format '{format}'")]
    UnparsableDate { value: String, format: String },

    /// Value is not a finite float.
    #[error("cannot parse '{0}' as a number")]
    UnparsableNumber(String),

    /// Value is an array or object.
    #[error("expected a scalar value, found {0}")]
    NotScalar(&'static str),
}

// =============================================================================
// Record Errors
// =============================================================================

/// A row that could not be turned into a processed record.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    /// Rows must be JSON objects.
    #[error("row is not a JSON object (found {0})")]
    NotAnObject(&'static str),
}

// =============================================================================
// Template Errors
// =============================================================================

/// Errors from the template registry.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// No built-in or file template with this name.
    #[error("Template {0} not found")]
    NotFound(String),

    /// Template data is malformed.
    #[error("Invalid template: {0}")]
    Invalid(String),

    /// IO error.
    #[error("Template IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("Template JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Batch Errors (top-level)
// =============================================================================

/// Errors that abort a whole batch.
///
/// Field and record failures never show up here; they are collected in the
/// [`crate::models::ValidationErrorReport`].
#[derive(Debug, Error)]
pub enum BatchError {
    /// Payload is missing `rows` or `templateName`, or they have the wrong shape.
    #[error("Invalid batch input: {0}")]
    InvalidInput(String),

    /// Template lookup failed.
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// Template and business rules disagree.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

// =============================================================================
// Export Errors
// =============================================================================

/// Errors while writing the tabular artifact.
#[derive(Debug, Error)]
pub enum ExportError {
    /// IO error.
    #[error("Export IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV writer error.
    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    /// Writer buffer could not be recovered.
    #[error("CSV buffer error: {0}")]
    Buffer(String),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Batch error.
    #[error("Batch error: {0}")]
    Batch(#[from] BatchError),

    /// Export error.
    #[error("Export error: {0}")]
    Export(#[from] ExportError),
}

impl From<TemplateError> for ServerError {
    fn from(err: TemplateError) -> Self {
        ServerError::Batch(BatchError::Template(err))
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for path lookups.
pub type PathResult<T> = Result<T, PathError>;

/// Result type for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Result type for batch operations.
pub type BatchResult<T> = Result<T, BatchError>;

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let template_err = TemplateError::NotFound("Missing_template".into());
        let batch_err: BatchError = template_err.into();
        assert!(batch_err.to_string().contains("Missing_template"));

        let server_err: ServerError = TemplateError::NotFound("Other".into()).into();
        assert!(matches!(
            server_err,
            ServerError::Batch(BatchError::Template(TemplateError::NotFound(_)))
        ));
    }

    #[test]
    fn test_path_error_format() {
        let err = PathError::IndexOutOfRange { index: 4, len: 2 };
        let msg = err.to_string();
        assert!(msg.contains('4'));
        assert!(msg.contains("length 2"));
    }
}

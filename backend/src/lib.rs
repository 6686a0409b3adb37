//! # Hookmap - template-driven mapping of webhook payloads
//!
//! Hookmap turns nested JSON webhook responses into flat, template-conformant
//! records, applies per-field transformations, and validates every record
//! against the template and business reference data.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Webhook   │────▶│    Rows     │────▶│  Map + Xfm  │────▶│  Records +  │
//! │  response   │     │  (parser)   │     │ (template)  │     │   errors    │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hookmap::{process_input, parse_batch_input, TemplateRegistry};
//!
//! let input = parse_batch_input(serde_json::from_str(payload)?)?;
//! let output = process_input(&input, &TemplateRegistry::new())?;
//! println!("{}", output.summary());
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Layered error types
//! - [`models`] - Templates, mappings, reference data, records
//! - [`path`] - Dotted path parsing and resolution
//! - [`parser`] - Webhook responses and batch payloads
//! - [`transform`] - Transformations, field mapping and the batch pipeline
//! - [`validation`] - Template and business-rule validation
//! - [`registry`] - Built-in and file-backed template catalogs
//! - [`export`] - Data and validation sheets
//! - [`config`] - Environment settings
//! - [`api`] - HTTP API server and log channel

// Core modules
pub mod error;
pub mod models;
pub mod path;

// Parsing
pub mod parser;

// Transformation
pub mod transform;

// Validation
pub mod validation;

// Templates
pub mod registry;

// Output
pub mod export;

pub mod config;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    BatchError, ExportError, PathError, RecordError, ServerError, TemplateError, TransformError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    BatchInput, FieldDefinition, FieldMapping, FieldRules, FieldType, ProcessedRecord,
    ReferenceData, ReferenceEntry, Template, ValidationErrorReport, ValidationMode,
};

// =============================================================================
// Re-exports - Paths and parsing
// =============================================================================

pub use path::{resolve, JsonPath, PathSegment};

pub use parser::{load_batch_input, parse_batch_input, rows_from_response, RowLayout};

// =============================================================================
// Re-exports - Transformation and pipeline
// =============================================================================

pub use transform::{
    apply_operation, format_date, format_number, format_text, map_field, map_value,
    process_batch, process_input, BatchOptions, BatchOutput, FieldMapper, Operator,
    Transformation,
};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::{
    check_required_consistency, is_valid_record, validate_mapped_field, validate_record,
    RecordValidation, RecordValidator,
};

// =============================================================================
// Re-exports - Registry, export, config
// =============================================================================

pub use registry::{BuiltinCatalog, FileCatalog, TemplateCatalog, TemplateRegistry};

pub use export::{data_sheet, validation_sheet, write_workbook};

pub use config::Settings;

// Server
pub mod server {
    pub use crate::api::server::{router, start_server, AppState};
}

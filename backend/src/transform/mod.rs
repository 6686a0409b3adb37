//! Transformation module.
//!
//! This module turns nested webhook rows into flat template records:
//! - Operations: typed transformations, operators, flat-row coercion
//! - Mapper: source paths resolved per template field
//! - Pipeline: batch processing with validation

pub mod mapper;
pub mod operations;
pub mod pipeline;

pub use mapper::{map_field, map_value, FieldMapper};
pub use operations::{apply_operation, format_date, format_number, format_text, Operator, Transformation};
pub use pipeline::*;

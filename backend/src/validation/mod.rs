//! Validation of processed records.
//!
//! # Validation Modes
//!
//! ## Mapping preview
//! Fixed business-field rules, used while a user is wiring up field mappings:
//! - `Organization`, `Location`, `Account Style Caption` are required
//! - `Location` / `Account Style Caption` must exist in the reference data
//! - `Start Date` / `End Date` must be `YYYY-MM-DD` (or the midnight timestamp
//!   a `date` transformation produces)
//! - any other field the template marks required must not be empty
//! - `Usage Amount` / `Cost Amount` must be numeric
//!
//! ## Template
//! The template's own per-field rules: `required`, `type`, numeric
//! `min`/`max`, string `pattern`.
//!
//! Validation never fails: every broken rule becomes an error string.

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::api::logs::log_warning;
use crate::error::BatchError;
use crate::models::{
    FieldDefinition, FieldType, ProcessedRecord, ReferenceIndex, Template, ValidationErrorReport,
};
use crate::path::display_value;
use crate::transform::operations::{
    is_blank, is_falsy, parse_date_lenient, parse_float, ISO_DATETIME_FORMAT,
};

pub const ORGANIZATION: &str = "Organization";
pub const LOCATION: &str = "Location";
pub const ACCOUNT_STYLE_CAPTION: &str = "Account Style Caption";

/// Fields the mapping preview always requires.
pub const BUSINESS_REQUIRED_FIELDS: [&str; 3] = [ORGANIZATION, LOCATION, ACCOUNT_STYLE_CAPTION];

const BUSINESS_DATE_FIELDS: [&str; 2] = ["Start Date", "End Date"];
const BUSINESS_NUMBER_FIELDS: [&str; 2] = ["Usage Amount", "Cost Amount"];
const BUSINESS_DATE_FORMAT: &str = "%Y-%m-%d";

// =============================================================================
// Mapping preview
// =============================================================================

/// Check one mapped business field and append every error to `report[index]`.
pub fn validate_mapped_field(
    field: &str,
    value: &Value,
    index: usize,
    refs: &ReferenceIndex<'_>,
    report: &mut ValidationErrorReport,
) {
    report.extend(index, mapped_field_errors(field, value, refs));
}

/// Errors for one mapped business field. Independent checks all fire.
pub fn mapped_field_errors(field: &str, value: &Value, refs: &ReferenceIndex<'_>) -> Vec<String> {
    let mut errors = Vec::new();
    let present = !is_falsy(value);
    let text = display_value(value);

    if !present && BUSINESS_REQUIRED_FIELDS.contains(&field) {
        errors.push(format!("{} is required", field));
    }

    if present {
        if field == LOCATION && !refs.locations.contains(text.as_str()) {
            errors.push(format!("Invalid location: {}", text));
        }
        if field == ACCOUNT_STYLE_CAPTION && !refs.account_styles.contains(text.as_str()) {
            errors.push(format!("Invalid account style: {}", text));
        }
        if BUSINESS_DATE_FIELDS.contains(&field) && !is_business_date(&text) {
            errors.push(format!(
                "Invalid date format for {}. Expected YYYY-MM-DD",
                field
            ));
        }
        if BUSINESS_NUMBER_FIELDS.contains(&field) && parse_float(&text).is_none() {
            errors.push(format!("Invalid numeric value for {}", field));
        }
    }

    errors
}

/// Mapping-preview errors for one template field: the template's `required`
/// flag first, then the business rules for that field name.
pub fn preview_field_errors(
    field: &FieldDefinition,
    value: &Value,
    refs: &ReferenceIndex<'_>,
) -> Vec<String> {
    let mut errors = Vec::new();
    // Business-required fields report through mapped_field_errors
    if field.required && is_blank(value) && !BUSINESS_REQUIRED_FIELDS.contains(&field.name.as_str()) {
        errors.push(format!("{} is required", field.name));
    }
    errors.extend(mapped_field_errors(&field.name, value, refs));
    errors
}

fn is_business_date(text: &str) -> bool {
    NaiveDate::parse_from_str(text, BUSINESS_DATE_FORMAT).is_ok()
        || NaiveDateTime::parse_from_str(text, ISO_DATETIME_FORMAT)
            .is_ok_and(|dt| dt.num_seconds_from_midnight() == 0)
}

/// Business-required fields must not be optional in the template.
///
/// The template is the authoritative source of required-ness; a template
/// that marks one of [`BUSINESS_REQUIRED_FIELDS`] optional is a
/// configuration error rather than two rule sets applied side by side.
pub fn check_required_consistency(template: &Template) -> Result<(), BatchError> {
    let conflicting: Vec<&str> = BUSINESS_REQUIRED_FIELDS
        .iter()
        .filter(|name| template.field(name).is_some_and(|f| !f.required))
        .copied()
        .collect();

    if conflicting.is_empty() {
        Ok(())
    } else {
        Err(BatchError::Configuration(format!(
            "template '{}' marks business-required field(s) {} as optional",
            template.name,
            conflicting.join(", ")
        )))
    }
}

// =============================================================================
// Template validation
// =============================================================================

/// Outcome of validating one record against a template.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecordValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl RecordValidation {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }
}

/// Template rules with patterns compiled once.
#[derive(Debug)]
pub struct RecordValidator<'a> {
    template: &'a Template,
    patterns: HashMap<&'a str, Regex>,
}

impl<'a> RecordValidator<'a> {
    pub fn new(template: &'a Template) -> Self {
        let mut patterns = HashMap::new();
        for field in &template.fields {
            let Some(ref pattern) = field.validation.pattern else {
                continue;
            };
            match Regex::new(pattern) {
                Ok(re) => {
                    patterns.insert(field.name.as_str(), re);
                }
                Err(e) => log_warning(format!(
                    "Ignoring invalid pattern for field '{}': {}",
                    field.name, e
                )),
            }
        }
        Self { template, patterns }
    }

    /// Check every template field; errors across fields are all collected.
    pub fn validate(&self, record: &ProcessedRecord) -> RecordValidation {
        let errors = self
            .template
            .fields
            .iter()
            .flat_map(|field| self.field_errors(field, record.get(&field.name)))
            .collect();
        RecordValidation::from_errors(errors)
    }

    fn field_errors(&self, field: &FieldDefinition, value: Option<&Value>) -> Vec<String> {
        let value = match value {
            Some(v) if !is_blank(v) => v,
            _ if field.required => {
                return vec![format!("Required field '{}' is missing or empty", field.name)]
            }
            _ => return Vec::new(),
        };

        let mut errors = Vec::new();
        match field.field_type {
            FieldType::Date => {
                let parsed = match value {
                    Value::String(s) => parse_date_lenient(s),
                    _ => None,
                };
                if parsed.is_none() {
                    errors.push(format!("Invalid date format for field '{}'", field.name));
                }
            }
            FieldType::Number => {
                let parsed = match value {
                    Value::Number(n) => n.as_f64(),
                    Value::String(s) => parse_float(s),
                    _ => None,
                };
                match parsed {
                    None => errors.push(format!("Invalid number format for field '{}'", field.name)),
                    Some(n) => {
                        if let Some(min) = field.validation.min.filter(|min| n < *min) {
                            errors.push(format!(
                                "Field '{}' must be greater than or equal to {}",
                                field.name, min
                            ));
                        }
                        if let Some(max) = field.validation.max.filter(|max| n > *max) {
                            errors.push(format!(
                                "Field '{}' must be less than or equal to {}",
                                field.name, max
                            ));
                        }
                    }
                }
            }
            FieldType::String => {
                if let Some(re) = self.patterns.get(field.name.as_str()) {
                    if !re.is_match(&display_value(value)) {
                        errors.push(format!(
                            "Field '{}' does not match required pattern",
                            field.name
                        ));
                    }
                }
            }
        }
        errors
    }
}

/// Validate one record against a template.
pub fn validate_record(record: &ProcessedRecord, template: &Template) -> RecordValidation {
    RecordValidator::new(template).validate(record)
}

/// Quick check against a template.
pub fn is_valid_record(record: &ProcessedRecord, template: &Template) -> bool {
    validate_record(record, template).is_valid
}

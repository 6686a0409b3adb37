//! Domain models for the hookmap pipeline.
//!
//! - [`Template`] / [`FieldDefinition`] - target tabular schema
//! - [`FieldMapping`] - how one template field is filled from a nested row
//! - [`ReferenceData`] - lookup lists used for membership checks
//! - [`ProcessedRecord`] - one flat output row, in template field order
//! - [`ValidationErrorReport`] - errors keyed by 1-based input row index
//! - [`BatchInput`] - the batch payload accepted by the CLI and HTTP API

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};

use crate::error::TemplateError;
use crate::transform::operations::{Operator, Transformation};

// =============================================================================
// Template
// =============================================================================

/// Column type of a template field.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    String,
    Number,
    Date,
}

/// Extra per-field rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FieldRules {
    /// Inclusive lower bound for number fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    /// Inclusive upper bound for number fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,

    /// Regex a string field must match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl FieldRules {
    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none() && self.pattern.is_none()
    }
}

/// One column of a template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldDefinition {
    pub name: String,

    #[serde(rename = "type", default)]
    pub field_type: FieldType,

    #[serde(default)]
    pub required: bool,

    #[serde(default, skip_serializing_if = "FieldRules::is_empty")]
    pub validation: FieldRules,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, field_type: FieldType, required: bool) -> Self {
        Self {
            name: name.into(),
            field_type,
            required,
            validation: FieldRules::default(),
        }
    }

    pub fn with_bounds(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.validation.min = min;
        self.validation.max = max;
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.validation.pattern = Some(pattern.into());
        self
    }
}

fn default_version() -> String {
    "1.0".to_string()
}

/// Named target schema: an ordered list of field definitions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Template {
    pub name: String,

    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub fields: Vec<FieldDefinition>,
}

impl Template {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDefinition>) -> Self {
        Self {
            name: name.into(),
            version: default_version(),
            description: None,
            fields,
        }
    }

    /// Field names in template order.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Look up a field definition by name.
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Reject templates with no fields or duplicate field names.
    pub fn check(&self) -> Result<(), TemplateError> {
        if self.fields.is_empty() {
            return Err(TemplateError::Invalid(format!(
                "template '{}' has no fields",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(TemplateError::Invalid(format!(
                    "duplicate field '{}' in template '{}'",
                    field.name, self.name
                )));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Field Mapping
// =============================================================================

/// Rule binding a template field to a path in the raw row.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapping {
    /// Template field (or business field) this mapping fills.
    pub label: String,

    /// Path into the raw row, e.g. `records.0.PriceArea` or `records[*].PriceArea`.
    #[serde(default, alias = "map_value", alias = "source_path")]
    pub source_path: String,

    /// Typed transformation applied last.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformation: Option<Transformation>,

    /// Operator combining the resolved value with `text_value`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<Operator>,

    /// Literal operand for `operation`.
    #[serde(default, alias = "text_value", skip_serializing_if = "Option::is_none")]
    pub text_value: Option<String>,
}

impl FieldMapping {
    pub fn new(label: impl Into<String>, source_path: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            source_path: source_path.into(),
            ..Self::default()
        }
    }

    pub fn with_transformation(mut self, transformation: Transformation) -> Self {
        self.transformation = Some(transformation);
        self
    }

    pub fn with_operation(mut self, operator: Operator, operand: Option<&str>) -> Self {
        self.operation = Some(operator);
        self.text_value = operand.map(str::to_string);
        self
    }
}

// =============================================================================
// Reference Data
// =============================================================================

/// A named entry of a reference list. Anything besides `name` is carried along.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReferenceEntry {
    pub name: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ReferenceEntry {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extra: Map::new(),
        }
    }
}

/// Snapshot of reference lists, supplied once per batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceData {
    #[serde(default)]
    pub locations: Vec<ReferenceEntry>,

    #[serde(default)]
    pub accounts: Vec<ReferenceEntry>,

    #[serde(default, alias = "account_styles")]
    pub account_styles: Vec<ReferenceEntry>,
}

impl ReferenceData {
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty() && self.accounts.is_empty() && self.account_styles.is_empty()
    }

    /// Build name sets for membership checks.
    pub fn index(&self) -> ReferenceIndex<'_> {
        fn names(entries: &[ReferenceEntry]) -> HashSet<&str> {
            entries.iter().map(|e| e.name.as_str()).collect()
        }

        ReferenceIndex {
            locations: names(&self.locations),
            accounts: names(&self.accounts),
            account_styles: names(&self.account_styles),
        }
    }
}

/// Borrowed name sets built from a [`ReferenceData`] snapshot.
#[derive(Debug, Default)]
pub struct ReferenceIndex<'a> {
    pub locations: HashSet<&'a str>,
    pub accounts: HashSet<&'a str>,
    pub account_styles: HashSet<&'a str>,
}

// =============================================================================
// Processed Record
// =============================================================================

/// One flat output row. Keys follow template field order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ProcessedRecord(Map<String, Value>);

impl ProcessedRecord {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<ProcessedRecord> for Value {
    fn from(record: ProcessedRecord) -> Self {
        record.into_value()
    }
}

// =============================================================================
// Validation Error Report
// =============================================================================

/// Error strings keyed by 1-based input row index.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ValidationErrorReport(BTreeMap<usize, Vec<String>>);

impl ValidationErrorReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one error for a row.
    pub fn push(&mut self, index: usize, message: impl Into<String>) {
        self.0.entry(index).or_default().push(message.into());
    }

    /// Append several errors for a row. Nothing is recorded for an empty list.
    pub fn extend<I, S>(&mut self, index: usize, messages: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut messages = messages.into_iter().map(Into::into).peekable();
        if messages.peek().is_some() {
            self.0.entry(index).or_default().extend(messages);
        }
    }

    pub fn get(&self, index: usize) -> Option<&[String]> {
        self.0.get(&index).map(Vec::as_slice)
    }

    pub fn contains(&self, index: usize) -> bool {
        self.0.contains_key(&index)
    }

    /// Row indices with at least one error, ascending.
    pub fn indices(&self) -> Vec<usize> {
        self.0.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&usize, &Vec<String>)> {
        self.0.iter()
    }

    /// Number of rows with errors.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of error strings across all rows.
    pub fn total_errors(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }
}

// =============================================================================
// Batch Input
// =============================================================================

/// Which rule set validates processed records.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// Per-field template rules: required, type, bounds, pattern.
    #[default]
    Template,
    /// Fixed business-field rules with reference membership checks.
    MappingPreview,
}

/// A batch payload: rows plus everything needed to process them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchInput {
    pub rows: Vec<Value>,

    #[serde(alias = "envizi_template", alias = "template_name")]
    pub template_name: String,

    #[serde(default, alias = "field_mappings", skip_serializing_if = "Option::is_none")]
    pub field_mappings: Option<Vec<FieldMapping>>,

    #[serde(default, alias = "drop_invalid_records")]
    pub drop_invalid_records: bool,

    #[serde(default)]
    pub references: ReferenceData,

    #[serde(default, alias = "validation_mode", skip_serializing_if = "Option::is_none")]
    pub validation_mode: Option<ValidationMode>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_template_deserialize_defaults() {
        let template: Template = serde_json::from_value(json!({
            "name": "Custom",
            "fields": [
                { "name": "Site", "required": true },
                { "name": "Quantity", "type": "number", "validation": { "min": 0 } }
            ]
        }))
        .unwrap();

        assert_eq!(template.version, "1.0");
        assert_eq!(template.fields[0].field_type, FieldType::String);
        assert!(!template.fields[1].required);
        assert_eq!(template.fields[1].validation.min, Some(0.0));
        assert_eq!(template.field_names(), vec!["Site", "Quantity"]);
    }

    #[test]
    fn test_template_rejects_duplicate_fields() {
        let template = Template::new(
            "Dup",
            vec![
                FieldDefinition::new("A", FieldType::String, true),
                FieldDefinition::new("A", FieldType::Number, false),
            ],
        );
        let err = template.check().unwrap_err();
        assert!(err.to_string().contains("duplicate field 'A'"));
    }

    #[test]
    fn test_field_mapping_accepts_legacy_keys() {
        let mapping: FieldMapping = serde_json::from_value(json!({
            "label": "Location",
            "map_value": "records.0.PriceArea",
            "text_value": "-DK"
        }))
        .unwrap();

        assert_eq!(mapping.source_path, "records.0.PriceArea");
        assert_eq!(mapping.text_value.as_deref(), Some("-DK"));
    }

    #[test]
    fn test_reference_index() {
        let refs: ReferenceData = serde_json::from_value(json!({
            "locations": [{ "name": "DK1", "id": 4 }],
            "account_styles": [{ "name": "Electricity" }]
        }))
        .unwrap();

        let index = refs.index();
        assert!(index.locations.contains("DK1"));
        assert!(index.account_styles.contains("Electricity"));
        assert!(index.accounts.is_empty());
        assert_eq!(refs.locations[0].extra["id"], 4);
    }

    #[test]
    fn test_error_report_is_keyed_and_ordered() {
        let mut report = ValidationErrorReport::new();
        report.push(3, "late");
        report.push(1, "first");
        report.extend(1, ["second"]);
        report.extend(2, Vec::<String>::new());

        assert_eq!(report.indices(), vec![1, 3]);
        assert_eq!(report.get(1).unwrap(), ["first", "second"]);
        assert!(!report.contains(2));
        assert_eq!(report.total_errors(), 3);
        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            json!({ "1": ["first", "second"], "3": ["late"] })
        );
    }

    #[test]
    fn test_processed_record_keeps_insertion_order() {
        let mut record = ProcessedRecord::new();
        record.insert("Zeta", json!("z"));
        record.insert("Alpha", json!(1));
        assert_eq!(record.field_names(), vec!["Zeta", "Alpha"]);
        assert_eq!(
            serde_json::to_string(&record).unwrap(),
            r#"{"Zeta":"z","Alpha":1}"#
        );
    }
}

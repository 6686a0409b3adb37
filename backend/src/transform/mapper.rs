//! Field mapping: one template field filled from one nested row.
//!
//! A [`FieldMapper`] compiles each [`FieldMapping`] once (path parsed into a
//! [`JsonPath`]) and is then applied to every row of a batch.

use serde_json::Value;
use std::collections::HashMap;

use crate::api::logs::log_warning;
use crate::error::PathError;
use crate::models::FieldMapping;
use crate::path::{display_value, JsonPath};

use super::operations::apply_operation;

/// A mapping with its source path already parsed.
#[derive(Debug, Clone)]
pub struct CompiledMapping {
    pub mapping: FieldMapping,
    pub path: JsonPath,
}

impl CompiledMapping {
    pub fn new(mapping: FieldMapping) -> Self {
        let path = JsonPath::parse(&mapping.source_path);
        Self { mapping, path }
    }

    /// Raw string value for this mapping, before any transform.
    pub fn text(&self, row: &Value) -> String {
        resolve_text(row, &self.path, &self.mapping.source_path, &self.mapping.label)
    }

    /// Final value: resolved text, then the operator, then the typed transformation.
    pub fn value(&self, row: &Value) -> Value {
        let mut value = Value::String(self.text(row));

        if let Some(ref operator) = self.mapping.operation {
            value = apply_operation(&value, operator, self.mapping.text_value.as_deref());
        }
        if let Some(ref transformation) = self.mapping.transformation {
            value = transformation.apply(&value);
        }

        value
    }
}

/// Mappings indexed by label.
#[derive(Debug, Clone, Default)]
pub struct FieldMapper {
    by_label: HashMap<String, CompiledMapping>,
}

impl FieldMapper {
    /// Compile mappings. When two mappings share a label the first one wins.
    pub fn new(mappings: &[FieldMapping]) -> Self {
        let mut by_label = HashMap::new();
        for mapping in mappings {
            by_label
                .entry(mapping.label.clone())
                .or_insert_with(|| CompiledMapping::new(mapping.clone()));
        }
        Self { by_label }
    }

    pub fn get(&self, label: &str) -> Option<&CompiledMapping> {
        self.by_label.get(label)
    }

    pub fn len(&self) -> usize {
        self.by_label.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_label.is_empty()
    }
}

/// Resolve a mapping's source path against a row as a string.
///
/// Empty path → `""`; a single segment (numeric or not) → direct top-level
/// key lookup; anything else walks the path. Null and unresolvable paths give `""`.
pub fn map_field(row: &Value, mapping: &FieldMapping) -> String {
    resolve_text(
        row,
        &JsonPath::parse(&mapping.source_path),
        &mapping.source_path,
        &mapping.label,
    )
}

/// [`map_field`] followed by the mapping's operator and transformation.
pub fn map_value(row: &Value, mapping: &FieldMapping) -> Value {
    CompiledMapping::new(mapping.clone()).value(row)
}

fn resolve_text(row: &Value, path: &JsonPath, source: &str, label: &str) -> String {
    if path.is_empty() {
        return String::new();
    }

    // Top-level keys are taken verbatim, so "2024" or "0" name object keys here
    if path.segments().len() == 1 && !path.has_wildcard() {
        return row.get(source).map(display_value).unwrap_or_default();
    }

    if path.has_wildcard() {
        return display_value(&path.resolve(row));
    }

    match path.lookup(row) {
        Ok(value) => display_value(value),
        Err(PathError::MissingKey(_)) => String::new(),
        Err(err) => {
            log_warning(format!("Field '{}': cannot resolve '{}': {}", label, path, err));
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::operations::{Operator, Transformation};
    use serde_json::json;

    fn sample_row() -> Value {
        json!({
            "dataset": "ElectricityProdex5MinRealtime",
            "total": 2,
            "records": [
                { "PriceArea": "DK1", "Minutes5DK": "2024-01-05", "ProductionMWh": "12.345" },
                { "PriceArea": "DK2", "Minutes5DK": "2024-01-06", "ProductionMWh": "7.1" }
            ]
        })
    }

    #[test]
    fn test_empty_path_is_empty() {
        assert_eq!(map_field(&sample_row(), &FieldMapping::new("Location", "")), "");
    }

    #[test]
    fn test_single_segment_direct_lookup() {
        let row = sample_row();
        assert_eq!(map_field(&row, &FieldMapping::new("Notes", "dataset")), "ElectricityProdex5MinRealtime");
        assert_eq!(map_field(&row, &FieldMapping::new("Notes", "total")), "2");
        assert_eq!(map_field(&row, &FieldMapping::new("Notes", "missing")), "");
        assert_eq!(map_field(&json!({ "x": null }), &FieldMapping::new("Notes", "x")), "");
        assert_eq!(map_field(&json!("scalar"), &FieldMapping::new("Notes", "x")), "");
    }

    #[test]
    fn test_numeric_single_segment_is_a_key() {
        let row = json!({ "0": "zero", "42": 7, "2024": { "kWh": 1 } });
        assert_eq!(map_field(&row, &FieldMapping::new("Notes", "0")), "zero");
        assert_eq!(map_field(&row, &FieldMapping::new("Notes", "42")), "7");
        assert_eq!(map_field(&row, &FieldMapping::new("Notes", "7")), "");
        assert_eq!(
            map_value(&row, &FieldMapping::new("Usage Amount", "42").with_operation(Operator::Multiply, Some("2"))),
            json!("14")
        );
    }

    #[test]
    fn test_nested_and_wildcard_paths() {
        let row = sample_row();
        assert_eq!(map_field(&row, &FieldMapping::new("Location", "records.1.PriceArea")), "DK2");
        assert_eq!(map_field(&row, &FieldMapping::new("Location", "records.5.PriceArea")), "");
        assert_eq!(
            map_field(&row, &FieldMapping::new("Location", "records[*].PriceArea")),
            "DK1, DK2"
        );
    }

    #[test]
    fn test_map_value_applies_operator_then_transformation() {
        let row = sample_row();

        let usage = FieldMapping::new("Usage Amount", "records.0.ProductionMWh")
            .with_operation(Operator::Multiply, Some("1000"))
            .with_transformation(Transformation::number(Some("round")));
        assert_eq!(map_value(&row, &usage), json!(12345.0));

        let start = FieldMapping::new("Start Date", "records.0.Minutes5DK")
            .with_transformation(Transformation::date(None));
        assert_eq!(map_value(&row, &start), json!("2024-01-05T00:00:00"));

        let fill = FieldMapping::new("Supplier", "records.0.Supplier")
            .with_operation(Operator::Add, Some("Energinet"));
        assert_eq!(map_value(&row, &fill), json!("Energinet"));
    }

    #[test]
    fn test_field_mapper_first_label_wins() {
        let mapper = FieldMapper::new(&[
            FieldMapping::new("Location", "records.0.PriceArea"),
            FieldMapping::new("Location", "records.1.PriceArea"),
        ]);
        assert_eq!(mapper.len(), 1);
        assert_eq!(mapper.get("Location").unwrap().value(&sample_row()), json!("DK1"));
        assert!(mapper.get("Organization").is_none());
    }
}

//! Batch processing: rows in, processed records and an error report out.
//!
//! For every row, in order:
//! 1. Build a [`ProcessedRecord`] (label mappings for nested rows, type
//!    coercion for rows that are already flat)
//! 2. A row that cannot be built is reported once and always dropped
//! 3. Validate the record (template rules or mapping-preview rules)
//! 4. Invalid records are reported, and kept unless `drop_invalid_records`
//!
//! Errors are keyed by the row's 1-based position in the input, so indices
//! stay stable even when rows are dropped.
//!
//! # Example
//!
//! ```rust,ignore
//! use hookmap::{process_batch, BatchOptions, ReferenceData, TemplateRegistry};
//!
//! let template = TemplateRegistry::new().get("Account_Setup_and_Data_Load_PM-C_template")?;
//! let output = process_batch(&rows, &template, None, &ReferenceData::default(), BatchOptions::default())?;
//! println!("{}", output.summary());
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::logs::{log_error, log_info, log_success, log_warning};
use crate::error::{BatchResult, RecordError};
use crate::models::{
    BatchInput, FieldMapping, ProcessedRecord, ReferenceData, ReferenceIndex, Template,
    ValidationErrorReport, ValidationMode,
};
use crate::path::kind;
use crate::registry::TemplateRegistry;
use crate::validation::{check_required_consistency, preview_field_errors, RecordValidator};

use super::mapper::FieldMapper;
use super::operations::coerce_to_type;

/// Options for one batch run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BatchOptions {
    /// Leave invalid records out of the output (their errors are still reported).
    pub drop_invalid_records: bool,

    /// Rule set used to validate records.
    pub validation: ValidationMode,
}

impl BatchOptions {
    /// Options requested by a batch payload.
    ///
    /// Without an explicit validation mode, mapped input is checked with the
    /// mapping-preview rules and flat input with the template rules.
    pub fn for_input(input: &BatchInput) -> Self {
        let validation = input.validation_mode.unwrap_or(if input.field_mappings.is_some() {
            ValidationMode::MappingPreview
        } else {
            ValidationMode::Template
        });
        Self {
            drop_invalid_records: input.drop_invalid_records,
            validation,
        }
    }

    pub fn dropping_invalid(mut self) -> Self {
        self.drop_invalid_records = true;
        self
    }

    pub fn with_validation(mut self, validation: ValidationMode) -> Self {
        self.validation = validation;
        self
    }
}

/// Result of a batch run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutput {
    /// Retained records, in input order.
    pub processed_records: Vec<ProcessedRecord>,

    /// Errors by 1-based input row index.
    pub validation_errors: ValidationErrorReport,
}

impl BatchOutput {
    pub fn summary(&self) -> String {
        format!(
            "Processed: {} records, {} rows with errors, {} errors",
            self.processed_records.len(),
            self.validation_errors.len(),
            self.validation_errors.total_errors()
        )
    }
}

/// Process a batch of rows against a template.
///
/// With `mappings`, each template field is filled from the mapping with the
/// same label (unmapped fields are `""`). Without, rows are taken as already
/// flat and each field is coerced to its template type.
///
/// Only a template that conflicts with the business rules aborts the batch;
/// row-level problems end up in [`BatchOutput::validation_errors`].
pub fn process_batch(
    rows: &[Value],
    template: &Template,
    mappings: Option<&[FieldMapping]>,
    references: &ReferenceData,
    options: BatchOptions,
) -> BatchResult<BatchOutput> {
    if options.validation == ValidationMode::MappingPreview {
        check_required_consistency(template)?;
    }

    log_info(format!(
        "Processing {} rows with template {} ({} fields)",
        rows.len(),
        template.name,
        template.fields.len()
    ));

    let mapper = mappings.map(FieldMapper::new);
    if let Some(ref mapper) = mapper {
        log_info(format!("Using {} field mappings", mapper.len()));
    }
    let ref_index = references.index();
    let validator = RecordValidator::new(template);

    let mut output = BatchOutput::default();
    let mut invalid = 0usize;

    for (offset, row) in rows.iter().enumerate() {
        let index = offset + 1;

        let record = match build_record(row, template, mapper.as_ref()) {
            Ok(record) => record,
            Err(e) => {
                log_error(format!("Error processing row {}: {}", index, e));
                output
                    .validation_errors
                    .push(index, format!("Record processing failed: {}", e));
                continue;
            }
        };

        let errors = match options.validation {
            ValidationMode::Template => validator.validate(&record).errors,
            ValidationMode::MappingPreview => preview_errors(&record, template, &ref_index),
        };

        if errors.is_empty() {
            output.processed_records.push(record);
            continue;
        }

        invalid += 1;
        output.validation_errors.extend(index, errors);
        if !options.drop_invalid_records {
            output.processed_records.push(record);
        }
    }

    if output.validation_errors.is_empty() {
        log_success(format!("All {} records valid", output.processed_records.len()));
    } else {
        log_warning(format!(
            "{} invalid records{}",
            invalid,
            if options.drop_invalid_records { " (dropped)" } else { "" }
        ));
        log_success(output.summary());
    }

    Ok(output)
}

/// Resolve the template named in a [`BatchInput`] and process it.
pub fn process_input(input: &BatchInput, registry: &TemplateRegistry) -> BatchResult<BatchOutput> {
    let template = registry.get(&input.template_name)?;
    process_with_template(input, &template)
}

/// Process a [`BatchInput`] against an already resolved template.
pub fn process_with_template(input: &BatchInput, template: &Template) -> BatchResult<BatchOutput> {
    process_batch(
        &input.rows,
        template,
        input.field_mappings.as_deref(),
        &input.references,
        BatchOptions::for_input(input),
    )
}

/// Build one record with an entry for every template field, in template order.
pub fn build_record(
    row: &Value,
    template: &Template,
    mapper: Option<&FieldMapper>,
) -> Result<ProcessedRecord, RecordError> {
    let object = row.as_object().ok_or(RecordError::NotAnObject(kind(row)))?;
    let mut record = ProcessedRecord::new();

    for field in &template.fields {
        let value = match mapper {
            Some(mapper) => mapper
                .get(&field.name)
                .map(|m| m.value(row))
                .unwrap_or_else(|| Value::String(String::new())),
            None => coerce_to_type(object.get(&field.name), field.field_type),
        };
        record.insert(field.name.clone(), value);
    }

    Ok(record)
}

fn preview_errors(
    record: &ProcessedRecord,
    template: &Template,
    refs: &ReferenceIndex<'_>,
) -> Vec<String> {
    template
        .fields
        .iter()
        .flat_map(|field| {
            let value = record.get(&field.name).unwrap_or(&Value::Null);
            preview_field_errors(field, value, refs)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldDefinition, FieldType, ReferenceEntry};
    use crate::registry::{BUSINESS_FIELDS_TEMPLATE, DEFAULT_TEMPLATE};
    use crate::transform::operations::Transformation;
    use serde_json::json;
    use tempfile::tempdir;

    fn usage_template() -> Template {
        Template::new(
            "Usage",
            vec![
                FieldDefinition::new("Site", FieldType::String, true),
                FieldDefinition::new("Day", FieldType::Date, true),
                FieldDefinition::new("Quantity", FieldType::Number, true),
                FieldDefinition::new("Comment", FieldType::String, false),
            ],
        )
    }

    fn references() -> ReferenceData {
        ReferenceData {
            locations: vec![ReferenceEntry::named("DK1"), ReferenceEntry::named("DK2")],
            accounts: vec![],
            account_styles: vec![ReferenceEntry::named("Electricity")],
        }
    }

    #[test]
    fn test_failed_row_is_dropped_and_reported() {
        let rows = vec![
            json!({ "Site": "A", "Day": "2024-01-05", "Quantity": "1" }),
            json!("not a row"),
            json!({ "Site": "C", "Day": "2024-01-07", "Quantity": 3 }),
        ];

        for drop in [true, false] {
            let options = BatchOptions {
                drop_invalid_records: drop,
                ..BatchOptions::default()
            };
            let output =
                process_batch(&rows, &usage_template(), None, &ReferenceData::default(), options)
                    .unwrap();

            assert_eq!(output.processed_records.len(), 2);
            assert_eq!(output.processed_records[0].get("Site"), Some(&json!("A")));
            assert_eq!(output.processed_records[1].get("Site"), Some(&json!("C")));
            assert_eq!(output.validation_errors.indices(), vec![2]);
            assert!(output.validation_errors.get(2).unwrap()[0].contains("not a JSON object"));
        }
    }

    #[test]
    fn test_drop_policy_for_invalid_records() {
        let rows = vec![
            json!({ "Site": "A", "Day": "2024-01-05", "Quantity": "abc" }),
            json!({ "Site": "B", "Day": "2024-01-06", "Quantity": "2" }),
        ];
        let template = usage_template();
        let refs = ReferenceData::default();

        let kept = process_batch(&rows, &template, None, &refs, BatchOptions::default()).unwrap();
        assert_eq!(kept.processed_records.len(), 2);
        assert_eq!(kept.processed_records[0].get("Quantity"), Some(&Value::Null));
        assert_eq!(
            kept.validation_errors.get(1).unwrap(),
            ["Required field 'Quantity' is missing or empty"]
        );

        let dropped = process_batch(
            &rows,
            &template,
            None,
            &refs,
            BatchOptions::default().dropping_invalid(),
        )
        .unwrap();
        assert_eq!(dropped.processed_records.len(), 1);
        assert_eq!(dropped.processed_records[0].get("Site"), Some(&json!("B")));
        assert_eq!(dropped.validation_errors, kept.validation_errors);
    }

    #[test]
    fn test_records_have_exactly_template_fields() {
        let rows = vec![
            json!({ "Extra": 1, "Quantity": 2, "Site": "X", "Day": "2024-02-01" }),
            json!({}),
        ];
        let template = usage_template();
        let output =
            process_batch(&rows, &template, None, &ReferenceData::default(), BatchOptions::default())
                .unwrap();

        for record in &output.processed_records {
            assert_eq!(record.field_names(), template.field_names());
        }
    }

    #[test]
    fn test_flat_processing_is_idempotent() {
        let rows = vec![
            json!({ "Site": "A", "Day": "2024-01-05T08:00:00", "Quantity": "12.5", "Comment": 7 }),
            json!({ "Site": "B", "Day": "bad", "Quantity": 4 }),
        ];
        let template = usage_template();
        let refs = ReferenceData::default();

        let first = process_batch(&rows, &template, None, &refs, BatchOptions::default()).unwrap();
        let canonical: Vec<Value> = first
            .processed_records
            .iter()
            .cloned()
            .map(Value::from)
            .collect();
        let second =
            process_batch(&canonical, &template, None, &refs, BatchOptions::default()).unwrap();

        assert_eq!(
            serde_json::to_string(&first.processed_records).unwrap(),
            serde_json::to_string(&second.processed_records).unwrap()
        );
        assert_eq!(first.processed_records[0].get("Day"), Some(&json!("2024-01-05")));
        assert_eq!(first.processed_records[0].get("Comment"), Some(&json!("7")));
    }

    #[test]
    fn test_mapping_mode_with_preview_validation() {
        let template = Template::new(
            "Preview",
            vec![
                FieldDefinition::new("Organization", FieldType::String, true),
                FieldDefinition::new("Location", FieldType::String, true),
                FieldDefinition::new("Start Date", FieldType::Date, false),
                FieldDefinition::new("Usage Amount", FieldType::Number, false),
                FieldDefinition::new("Notes", FieldType::String, false),
            ],
        );
        let mappings = vec![
            FieldMapping::new("Organization", "org"),
            FieldMapping::new("Location", "records.0.PriceArea"),
            FieldMapping::new("Start Date", "records.0.Day"),
            FieldMapping::new("Usage Amount", "records.0.MWh")
                .with_transformation(Transformation::number(Some("round"))),
        ];
        let rows = vec![
            json!({ "org": "Acme", "records": [{ "PriceArea": "DK1", "Day": "2024-01-05", "MWh": "1.005" }] }),
            json!({ "records": [{ "PriceArea": "SE3", "Day": "05.01.2024", "MWh": "x" }] }),
        ];

        let output = process_batch(
            &rows,
            &template,
            Some(mappings.as_slice()),
            &references(),
            BatchOptions::default().with_validation(ValidationMode::MappingPreview),
        )
        .unwrap();

        assert_eq!(output.processed_records.len(), 2);
        let first = &output.processed_records[0];
        assert_eq!(first.get("Location"), Some(&json!("DK1")));
        assert_eq!(first.get("Notes"), Some(&json!("")));
        assert_eq!(first.field_names(), template.field_names());

        assert_eq!(output.validation_errors.indices(), vec![2]);
        assert_eq!(
            output.validation_errors.get(2).unwrap(),
            [
                "Organization is required",
                "Invalid location: SE3",
                "Invalid date format for Start Date. Expected YYYY-MM-DD",
                "Invalid numeric value for Usage Amount",
            ]
        );
    }

    #[test]
    fn test_preview_reports_template_required_fields() {
        let dir = tempdir().unwrap();
        let template = TemplateRegistry::with_dir(dir.path()).get(DEFAULT_TEMPLATE).unwrap();
        let mappings = vec![
            FieldMapping::new("Organization", "org"),
            FieldMapping::new("Location", "area"),
            FieldMapping::new("Account Style Caption", "style"),
        ];
        let rows = vec![json!({ "org": "Acme", "area": "DK1", "style": "Electricity" })];

        let output = process_batch(
            &rows,
            &template,
            Some(mappings.as_slice()),
            &references(),
            BatchOptions::default()
                .with_validation(ValidationMode::MappingPreview)
                .dropping_invalid(),
        )
        .unwrap();

        assert!(output.processed_records.is_empty());
        assert_eq!(
            output.validation_errors.get(1).unwrap(),
            [
                "Organization Link is required",
                "Account Style Link is required",
                "Account Number is required",
                "Record Start YYYY-MM-DD is required",
                "Record End YYYY-MM-DD is required",
                "Quantity is required",
            ]
        );
    }

    #[test]
    fn test_mapping_mode_with_template_validation() {
        let template = Template::new(
            "Readings",
            vec![
                FieldDefinition::new("Area", FieldType::String, true),
                FieldDefinition::new("Start", FieldType::Date, true),
            ],
        );
        let mappings = vec![
            FieldMapping::new("Area", "records[*].PriceArea"),
            FieldMapping::new("Start", "records.0.Day").with_transformation(Transformation::date(None)),
        ];
        let rows = vec![json!({ "records": [{ "PriceArea": "DK1", "Day": "2024-01-05" }, { "PriceArea": "DK2" }] })];

        let output =
            process_batch(&rows, &template, Some(mappings.as_slice()), &references(), BatchOptions::default())
                .unwrap();
        assert!(output.validation_errors.is_empty());
        assert_eq!(output.processed_records[0].get("Area"), Some(&json!("DK1, DK2")));
        assert_eq!(
            output.processed_records[0].get("Start"),
            Some(&json!("2024-01-05T00:00:00"))
        );
    }

    #[test]
    fn test_preview_rejects_conflicting_template() {
        let template = Template::new(
            "Loose",
            vec![FieldDefinition::new("Location", FieldType::String, false)],
        );
        let mappings: Vec<FieldMapping> = Vec::new();
        let result = process_batch(
            &[json!({})],
            &template,
            Some(mappings.as_slice()),
            &ReferenceData::default(),
            BatchOptions::default().with_validation(ValidationMode::MappingPreview),
        );
        assert!(matches!(result, Err(crate::error::BatchError::Configuration(_))));
    }

    #[test]
    fn test_process_input_resolves_template() {
        let dir = tempdir().unwrap();
        let registry = TemplateRegistry::with_dir(dir.path());
        let input: BatchInput = serde_json::from_value(json!({
            "rows": [{ "Organization": "Acme", "Location": "DK1", "Account Style Caption": "Electricity" }],
            "templateName": BUSINESS_FIELDS_TEMPLATE,
            "fieldMappings": [
                { "label": "Organization", "sourcePath": "Organization" },
                { "label": "Location", "sourcePath": "Location" },
                { "label": "Account Style Caption", "sourcePath": "Account Style Caption" }
            ],
            "references": references()
        }))
        .unwrap();

        let output = process_input(&input, &registry).unwrap();
        assert!(output.validation_errors.is_empty(), "{:?}", output.validation_errors);
        assert_eq!(output.processed_records[0].len(), 14);

        let mut missing = input.clone();
        missing.template_name = "Unknown_template".into();
        assert!(process_input(&missing, &registry).is_err());

        let mut flat = input;
        flat.field_mappings = None;
        flat.template_name = DEFAULT_TEMPLATE.into();
        let output = process_input(&flat, &registry).unwrap();
        assert!(output
            .validation_errors
            .get(1)
            .unwrap()
            .contains(&"Required field 'Organization Link' is missing or empty".to_string()));
    }
}

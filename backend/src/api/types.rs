//! REST API response types.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::models::{ProcessedRecord, ValidationErrorReport};
use crate::transform::BatchOutput;

/// Response for a processed batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub job_id: String,

    /// "ready" when every row passed, "warning" otherwise
    pub status: String,

    pub processed_records: Vec<ProcessedRecord>,

    pub validation_errors: ValidationErrorReport,

    pub metadata: BatchMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchMetadata {
    pub template_name: String,
    pub total_rows: usize,
    pub processed: usize,
    pub rows_with_errors: usize,
    pub total_errors: usize,
}

impl BatchResponse {
    pub fn new(job_id: String, template_name: &str, total_rows: usize, output: BatchOutput) -> Self {
        let metadata = BatchMetadata {
            template_name: template_name.to_string(),
            total_rows,
            processed: output.processed_records.len(),
            rows_with_errors: output.validation_errors.len(),
            total_errors: output.validation_errors.total_errors(),
        };

        Self {
            job_id,
            status: status_for(&output.validation_errors).to_string(),
            processed_records: output.processed_records,
            validation_errors: output.validation_errors,
            metadata,
        }
    }
}

/// Response for an export request: both sheets as CSV text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResponse {
    pub job_id: String,
    pub status: String,
    pub data_sheet: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_sheet: Option<String>,
}

fn status_for(errors: &ValidationErrorReport) -> &'static str {
    if errors.is_empty() {
        "ready"
    } else {
        "warning"
    }
}

pub fn new_job_id() -> String {
    Uuid::new_v4().to_string()
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "jobId": new_job_id(),
        "status": "error",
        "error": error,
        "processedRecords": [],
        "validationErrors": {}
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_response_shape() {
        let mut record = ProcessedRecord::new();
        record.insert("Location", json!("DK1"));
        let mut validation_errors = ValidationErrorReport::new();
        validation_errors.push(2, "Location is required");

        let output = BatchOutput {
            processed_records: vec![record],
            validation_errors,
        };
        let response = BatchResponse::new("job".into(), "Usage", 2, output);
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["status"], "warning");
        assert_eq!(json["processedRecords"][0]["Location"], "DK1");
        assert_eq!(json["validationErrors"]["2"][0], "Location is required");
        assert_eq!(json["metadata"]["rowsWithErrors"], 1);
    }

    #[test]
    fn test_error_response() {
        let json = error_response("Template X not found");
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"], "Template X not found");
        assert!(Uuid::parse_str(json["jobId"].as_str().unwrap()).is_ok());
    }
}

//! Webhook response and batch payload parsing.
//!
//! Turns raw JSON into the inputs the pipeline works on. No mapping logic here.

use serde_json::Value;
use std::path::Path;
use std::str::FromStr;

use crate::error::{BatchError, BatchResult};
use crate::models::BatchInput;
use crate::path::kind;

/// Keys accepted for the template name, in lookup order.
const TEMPLATE_NAME_KEYS: [&str; 3] = ["templateName", "envizi_template", "template_name"];

/// How a webhook response is split into rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RowLayout {
    /// The whole response is one row (`"1-single"`).
    Single,
    /// Rows are the response's `records` array.
    #[default]
    Multiple,
}

impl FromStr for RowLayout {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "1-single" | "single" => RowLayout::Single,
            _ => RowLayout::Multiple,
        })
    }
}

/// Extract rows from a webhook response.
///
/// # Example
/// ```ignore
/// use hookmap::parser::{rows_from_response, RowLayout};
///
/// let response = serde_json::json!({ "records": [{ "PriceArea": "DK1" }] });
/// let rows = rows_from_response(&response, RowLayout::Multiple);
/// assert_eq!(rows.len(), 1);
/// ```
pub fn rows_from_response(response: &Value, layout: RowLayout) -> Vec<Value> {
    match layout {
        RowLayout::Single => vec![response.clone()],
        RowLayout::Multiple => response
            .get("records")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
    }
}

/// Check and decode a batch payload.
///
/// Fails with [`BatchError::InvalidInput`] when `rows` is missing or not an
/// array, or when no template name is given.
pub fn parse_batch_input(value: Value) -> BatchResult<BatchInput> {
    let object = value.as_object().ok_or_else(|| {
        BatchError::InvalidInput(format!("expected a JSON object, found {}", kind(&value)))
    })?;

    match object.get("rows") {
        None => return Err(BatchError::InvalidInput("missing 'rows'".into())),
        Some(rows) if !rows.is_array() => {
            return Err(BatchError::InvalidInput(format!(
                "'rows' must be an array, found {}",
                kind(rows)
            )))
        }
        Some(_) => {}
    }

    let has_template = TEMPLATE_NAME_KEYS
        .iter()
        .any(|key| object.get(*key).and_then(Value::as_str).is_some_and(|s| !s.is_empty()));
    if !has_template {
        return Err(BatchError::InvalidInput("missing 'templateName'".into()));
    }

    serde_json::from_value(value).map_err(|e| BatchError::InvalidInput(e.to_string()))
}

/// Read a JSON document from disk.
pub fn load_json_file<P: AsRef<Path>>(path: P) -> BatchResult<Value> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        BatchError::InvalidInput(format!("cannot read '{}': {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        BatchError::InvalidInput(format!("cannot parse '{}': {}", path.display(), e))
    })
}

/// Read and check a batch payload from disk.
pub fn load_batch_input<P: AsRef<Path>>(path: P) -> BatchResult<BatchInput> {
    parse_batch_input(load_json_file(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_single_layout_wraps_response() {
        let response = json!({ "total": 1, "records": [{ "a": 1 }] });
        let rows = rows_from_response(&response, "1-single".parse().unwrap());
        assert_eq!(rows, vec![response]);
    }

    #[test]
    fn test_multiple_layout_uses_records() {
        let response = json!({ "records": [{ "a": 1 }, { "a": 2 }] });
        assert_eq!(rows_from_response(&response, RowLayout::Multiple).len(), 2);
        assert!(rows_from_response(&json!({}), RowLayout::Multiple).is_empty());
        assert!(rows_from_response(&json!({ "records": "x" }), RowLayout::Multiple).is_empty());
        assert_eq!("2-multiple".parse::<RowLayout>().unwrap(), RowLayout::Multiple);
    }

    #[test]
    fn test_parse_batch_input() {
        let input = parse_batch_input(json!({
            "rows": [{ "a": 1 }],
            "envizi_template": "Account_Setup_and_Data_Load_PM-C_template",
            "dropInvalidRecords": true
        }))
        .unwrap();
        assert_eq!(input.rows.len(), 1);
        assert_eq!(input.template_name, "Account_Setup_and_Data_Load_PM-C_template");
        assert!(input.drop_invalid_records);
        assert!(input.field_mappings.is_none());
    }

    #[test]
    fn test_parse_batch_input_rejects_bad_payloads() {
        let cases = [
            json!([]),
            json!({ "templateName": "t" }),
            json!({ "rows": {}, "templateName": "t" }),
            json!({ "rows": [] }),
            json!({ "rows": [], "templateName": "" }),
        ];
        for case in cases {
            assert!(
                matches!(parse_batch_input(case.clone()), Err(BatchError::InvalidInput(_))),
                "{}",
                case
            );
        }
    }

    #[test]
    fn test_load_batch_input_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("batch.json");
        std::fs::write(&path, r#"{ "rows": [], "templateName": "t" }"#).unwrap();
        assert_eq!(load_batch_input(&path).unwrap().template_name, "t");

        std::fs::write(&path, "{ not json").unwrap();
        assert!(load_json_file(&path).is_err());
        assert!(load_json_file(dir.path().join("missing.json")).is_err());
    }
}

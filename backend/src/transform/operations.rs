//! Value transformations applied to mapped fields.
//!
//! Two kinds of transform exist:
//!
//! - [`Transformation`] - typed reformatting (`date`, `number`, `text`)
//! - [`Operator`] - combine a resolved value with a literal operand
//!   (`+`, `-`, `*`, `%`, `Append`)
//!
//! Neither ever fails. `try_apply` exposes the fallback branch as a
//! [`TransformError`]; `apply` turns it back into the original value.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::error::TransformError;
use crate::models::FieldType;
use crate::path::{display_value, kind};

/// Default `strptime`-style format for date transformations.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Output format for transformed dates (ISO-8601, no timezone).
pub const ISO_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Formats tried, in order, when a date has no declared format.
const LENIENT_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const LENIENT_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%Y%m%d"];

// =============================================================================
// Typed transformation
// =============================================================================

/// Typed transformation attached to a field mapping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Transformation {
    /// Reparse with `format` (default `%Y-%m-%d`) and emit an ISO timestamp.
    Date {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<String>,
    },

    /// Parse as float; `format: "round"` rounds to 2 decimals.
    Number {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<String>,
    },

    /// `uppercase`, `lowercase` or `trim`.
    Text {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        operation: Option<String>,
    },

    /// Leave the value alone. Unknown types land here too.
    #[serde(other)]
    Direct,
}

impl Transformation {
    pub fn date(format: Option<&str>) -> Self {
        Transformation::Date {
            format: format.map(str::to_string),
        }
    }

    pub fn number(format: Option<&str>) -> Self {
        Transformation::Number {
            format: format.map(str::to_string),
        }
    }

    pub fn text(operation: &str) -> Self {
        Transformation::Text {
            operation: Some(operation.to_string()),
        }
    }

    /// Apply, falling back to the original value on failure.
    pub fn apply(&self, value: &Value) -> Value {
        self.try_apply(value).unwrap_or_else(|_| value.clone())
    }

    /// Apply, reporting unparsable input instead of falling back.
    pub fn try_apply(&self, value: &Value) -> Result<Value, TransformError> {
        match self {
            Transformation::Date { format } => {
                if is_blank(value) {
                    return Ok(Value::Null);
                }
                let text = scalar_text(value)?;
                let format = format.as_deref().unwrap_or(DEFAULT_DATE_FORMAT);
                format_date(&text, Some(format))
                    .map(Value::String)
                    .ok_or_else(|| TransformError::UnparsableDate {
                        value: text,
                        format: format.to_string(),
                    })
            }

            Transformation::Number { format } => {
                if value.is_null() {
                    return Ok(Value::Null);
                }
                let parsed = match value {
                    Value::Number(n) => n.as_f64(),
                    other => parse_float(&scalar_text(other)?),
                };
                parsed
                    .map(|n| round_if(n, format.as_deref()))
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(|| TransformError::UnparsableNumber(display_value(value)))
            }

            Transformation::Text { operation } => {
                if value.is_null() {
                    return Ok(Value::Null);
                }
                match operation.as_deref() {
                    Some(op @ ("uppercase" | "lowercase" | "trim")) => {
                        Ok(Value::String(format_text(&scalar_text(value)?, Some(op))))
                    }
                    _ => Ok(value.clone()),
                }
            }

            Transformation::Direct => Ok(value.clone()),
        }
    }
}

/// Parse `value` with `format` (default `%Y-%m-%d`) and render it as
/// `YYYY-MM-DDTHH:MM:SS`. Date-only formats yield midnight.
pub fn format_date(value: &str, format: Option<&str>) -> Option<String> {
    let format = format.unwrap_or(DEFAULT_DATE_FORMAT);

    NaiveDateTime::parse_from_str(value, format)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, format)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|dt| dt.format(ISO_DATETIME_FORMAT).to_string())
}

/// Parse `value` as a float; `format == "round"` rounds to 2 decimals.
pub fn format_number(value: &str, format: Option<&str>) -> Option<f64> {
    parse_float(value).map(|n| round_if(n, format))
}

/// Apply a text operation. Unknown operations return the input unchanged.
pub fn format_text(value: &str, operation: Option<&str>) -> String {
    match operation {
        Some("uppercase") => value.to_uppercase(),
        Some("lowercase") => value.to_lowercase(),
        Some("trim") => value.trim().to_string(),
        _ => value.to_string(),
    }
}

fn round_if(n: f64, format: Option<&str>) -> f64 {
    if format == Some("round") {
        (n * 100.0).round() / 100.0
    } else {
        n
    }
}

// =============================================================================
// Operator transform
// =============================================================================

/// Operator combining a resolved value with a literal operand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
    /// Divide by 100; the operand is ignored.
    Percent,
    Append,
    /// Anything else passes the value through.
    Other(String),
}

impl Operator {
    pub fn parse(symbol: &str) -> Self {
        match symbol {
            "+" => Operator::Add,
            "-" => Operator::Subtract,
            "*" => Operator::Multiply,
            "%" => Operator::Percent,
            "Append" => Operator::Append,
            other => Operator::Other(other.to_string()),
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            Operator::Add => "+",
            Operator::Subtract => "-",
            Operator::Multiply => "*",
            Operator::Percent => "%",
            Operator::Append => "Append",
            Operator::Other(s) => s,
        }
    }
}

impl From<String> for Operator {
    fn from(symbol: String) -> Self {
        Operator::parse(&symbol)
    }
}

impl From<Operator> for String {
    fn from(op: Operator) -> Self {
        op.symbol().to_string()
    }
}

/// Combine `value` with `operand`.
///
/// A falsy `value` (null, `""`, zero, `false`) short-circuits to the operand:
/// the operand acts as a default fill for empty source fields.
pub fn apply_operation(value: &Value, operator: &Operator, operand: Option<&str>) -> Value {
    if is_falsy(value) {
        return Value::String(operand.unwrap_or_default().to_string());
    }

    let operand_or = |default: f64| match operand {
        None | Some("") => Some(default),
        Some(s) => parse_float(s),
    };
    let arithmetic = |rhs: Option<f64>, op: fn(f64, f64) -> f64| -> Value {
        let lhs = scalar_text(value).ok().and_then(|s| parse_float(&s));
        match (lhs, rhs) {
            (Some(a), Some(b)) => render_float(op(a, b)).unwrap_or_else(|| value.clone()),
            _ => value.clone(),
        }
    };

    match operator {
        Operator::Add => arithmetic(operand_or(0.0), |a, b| a + b),
        Operator::Subtract => arithmetic(operand_or(0.0), |a, b| a - b),
        Operator::Multiply => arithmetic(operand_or(1.0), |a, b| a * b),
        Operator::Percent => arithmetic(Some(100.0), |a, b| a / b),
        Operator::Append => match operand {
            Some(suffix) if !suffix.is_empty() => {
                Value::String(format!("{}{}", display_value(value), suffix))
            }
            _ => value.clone(),
        },
        Operator::Other(_) => value.clone(),
    }
}

fn render_float(n: f64) -> Option<Value> {
    n.is_finite().then(|| Value::String(n.to_string()))
}

// =============================================================================
// Flat-record coercion
// =============================================================================

/// Coerce a value from an already-flat row to a template field type.
///
/// Dates become `YYYY-MM-DD`, numbers become floats, strings are stringified.
/// Anything that does not coerce becomes null.
pub fn coerce_to_type(value: Option<&Value>, field_type: FieldType) -> Value {
    let value = match value {
        None | Some(Value::Null) => return Value::Null,
        Some(v) => v,
    };

    match field_type {
        FieldType::Date => scalar_text(value)
            .ok()
            .and_then(|s| parse_date_lenient(&s))
            .map(|dt| Value::String(dt.format(DEFAULT_DATE_FORMAT).to_string()))
            .unwrap_or(Value::Null),
        FieldType::Number => {
            let parsed = match value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => parse_float(s),
                _ => None,
            };
            parsed
                .and_then(Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null)
        }
        FieldType::String => Value::String(display_value(value)),
    }
}

// =============================================================================
// Shared helpers
// =============================================================================

/// Parse a finite float, ignoring surrounding whitespace.
pub fn parse_float(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Parse a date or datetime in any of the commonly seen shapes.
pub fn parse_date_lenient(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for format in LENIENT_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    LENIENT_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(s, format).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Falsy in the loose sense: null, empty string/array/object, zero, `false`.
pub fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

/// Null or the empty string.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn scalar_text(value: &Value) -> Result<String, TransformError> {
    match value {
        Value::Array(_) | Value::Object(_) => Err(TransformError::NotScalar(kind(value))),
        other => Ok(display_value(other)),
    }
}

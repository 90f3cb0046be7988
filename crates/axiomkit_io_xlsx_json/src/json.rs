//! JSON boundary for record sequences.

use serde_json::{Map, Value};

use crate::spec::{EnumCellValue, SpecRecord, XlsxJsonError};

/// Serialize records as a JSON array of objects, keeping key order.
pub fn convert_records_to_json_string(records: &[SpecRecord]) -> Result<String, XlsxJsonError> {
    serde_json::to_string(records)
        .map_err(|err| XlsxJsonError::from_processing(format!("JSON encode error: {err}")))
}

/// Parse a JSON array of objects into records.
///
/// `null` elements become empty records. Nested arrays/objects are kept as their JSON text.
pub fn derive_records_from_json_str(txt: &str) -> Result<Vec<SpecRecord>, XlsxJsonError> {
    let payload: Value = serde_json::from_str(txt)
        .map_err(|err| XlsxJsonError::InvalidRequest(format!("Invalid JSON payload: {err}")))?;

    let Value::Array(l_items) = payload else {
        return Err(XlsxJsonError::InvalidRequest(
            "JSON payload must be an array of objects.".to_string(),
        ));
    };

    l_items
        .into_iter()
        .enumerate()
        .map(|(n_idx, item)| match item {
            Value::Null => Ok(SpecRecord::new()),
            Value::Object(dict_fields) => Ok(derive_record_from_object(dict_fields)),
            other => Err(XlsxJsonError::InvalidRequest(format!(
                "JSON element {n_idx} must be an object, got {}.",
                derive_json_kind(&other)
            ))),
        })
        .collect()
}

fn derive_record_from_object(dict_fields: Map<String, Value>) -> SpecRecord {
    dict_fields
        .into_iter()
        .map(|(key, value)| (key, convert_json_value(value)))
        .collect()
}

fn convert_json_value(value: Value) -> EnumCellValue {
    match value {
        Value::Null => EnumCellValue::Null,
        Value::Bool(val) => EnumCellValue::Boolean(val),
        Value::Number(num) => match num.as_i64() {
            Some(val) => EnumCellValue::Integer(val),
            None => num
                .as_f64()
                .map_or(EnumCellValue::Null, EnumCellValue::Float),
        },
        Value::String(val) => EnumCellValue::String(val),
        nested @ (Value::Array(_) | Value::Object(_)) => EnumCellValue::String(nested.to_string()),
    }
}

fn derive_json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

use rusqlite::types::Value;

use crate::config::JsonWriteOptions;
use crate::error::SqliteQueueError;
use crate::types::RowValues;

/// Text layout used when binding timestamps.
pub(crate) const TIMESTAMP_FORMAT: &str = "%F %T%.f";

/// Encode a structured value as JSON text.
///
/// # Errors
/// Returns `SqliteQueueError::MappingError` if `serde_json` refuses the value.
pub(crate) fn encode_json(
    value: &serde_json::Value,
    options: JsonWriteOptions,
) -> Result<String, SqliteQueueError> {
    let encoded = if options.pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    encoded.map_err(|err| SqliteQueueError::mapping(format!("cannot encode JSON value: {err}")))
}

/// Convert a single `RowValues` into the value rusqlite binds.
///
/// # Errors
/// Returns `SqliteQueueError::MappingError` if a structured value cannot be encoded.
pub(crate) fn row_value_to_sqlite_value(
    value: &RowValues,
    json: JsonWriteOptions,
) -> Result<Value, SqliteQueueError> {
    Ok(match value {
        RowValues::Int(i) => Value::Integer(*i),
        RowValues::Float(f) => Value::Real(*f),
        RowValues::Text(s) => Value::Text(s.clone()),
        RowValues::Bool(b) => Value::Integer(i64::from(*b)),
        RowValues::Timestamp(dt) => Value::Text(dt.format(TIMESTAMP_FORMAT).to_string()),
        RowValues::Null => Value::Null,
        RowValues::JSON(jval) => Value::Text(encode_json(jval, json)?),
        RowValues::Blob(bytes) => Value::Blob(bytes.clone()),
    })
}

/// Convert every parameter up front so a failure leaves the statement unbound.
///
/// # Errors
/// Propagates the first conversion failure.
pub(crate) fn convert_params(
    params: &[RowValues],
    json: JsonWriteOptions,
) -> Result<Vec<Value>, SqliteQueueError> {
    params
        .iter()
        .map(|p| row_value_to_sqlite_value(p, json))
        .collect()
}

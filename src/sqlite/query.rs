use rusqlite::types::ValueRef;

use crate::error::SqliteQueueError;
use crate::types::RowValues;

/// Extract a `RowValues` from a `SQLite` row.
///
/// # Errors
///
/// Returns `SqliteQueueError` if the column index is out of range or text is not UTF-8.
pub(crate) fn sqlite_extract_value_sync(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> Result<RowValues, SqliteQueueError> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => RowValues::Null,
        ValueRef::Integer(i) => RowValues::Int(i),
        ValueRef::Real(f) => RowValues::Float(f),
        ValueRef::Text(bytes) => RowValues::Text(
            std::str::from_utf8(bytes)
                .map_err(|err| {
                    SqliteQueueError::mapping(format!("column {idx} holds invalid UTF-8: {err}"))
                })?
                .to_owned(),
        ),
        ValueRef::Blob(bytes) => RowValues::Blob(bytes.to_vec()),
    })
}

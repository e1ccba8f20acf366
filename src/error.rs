use thiserror::Error;

/// Errors reported by the engine, the mapping layer, and the serial queue.
#[derive(Debug, Error)]
pub enum SqliteQueueError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Invalid state: {0}")]
    StateError(String),

    #[error("Bind error: statement expects {expected} parameter(s), got {actual}")]
    BindError { expected: usize, actual: usize },

    #[error("SQLite error {code}: {message}")]
    StepError { code: i32, message: String },

    #[error("Schema error: {0}")]
    SchemaError(String),

    #[error("Mapping error: {0}")]
    MappingError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Queue error: {0}")]
    QueueError(String),

    #[error("Queue error: synchronous submission from inside a running unit of work")]
    Reentrant,

    #[error("Unit of work panicked: {0}")]
    WorkPanicked(String),
}

impl From<rusqlite::Error> for SqliteQueueError {
    fn from(err: rusqlite::Error) -> Self {
        let code = err
            .sqlite_error()
            .map_or(rusqlite::ffi::SQLITE_ERROR, |native| native.extended_code);
        SqliteQueueError::StepError {
            code,
            message: err.to_string(),
        }
    }
}

impl SqliteQueueError {
    /// Native SQLite extended result code, when the error came from the engine.
    #[must_use]
    pub fn native_code(&self) -> Option<i32> {
        match self {
            SqliteQueueError::StepError { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub(crate) fn mapping(message: impl Into<String>) -> Self {
        SqliteQueueError::MappingError(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rusqlite_failures_keep_extended_code() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY)")
            .unwrap();
        conn.execute("INSERT INTO t (id) VALUES (1)", []).unwrap();
        let err: SqliteQueueError = conn
            .execute("INSERT INTO t (id) VALUES (1)", [])
            .unwrap_err()
            .into();
        assert_eq!(
            err.native_code(),
            Some(rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
        );
        assert!(err.to_string().contains("UNIQUE constraint failed"));
    }

    #[test]
    fn bind_error_message_names_both_counts() {
        let err = SqliteQueueError::BindError {
            expected: 2,
            actual: 1,
        };
        assert_eq!(
            err.to_string(),
            "Bind error: statement expects 2 parameter(s), got 1"
        );
    }
}

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rusqlite::types::Value;

use crate::error::SqliteQueueError;
use crate::results::{Row, RowColumns};
use crate::types::RowValues;

use super::query::sqlite_extract_value_sync;

const MEMORY_PATH: &str = ":memory:";

/// Owner of the native `rusqlite` connection.
///
/// Only the engine touches this type; it exposes the prepare / bind / step / finalize cycle
/// the engine builds its query surface on.
pub(crate) struct ConnectionHandle {
    conn: rusqlite::Connection,
    path: String,
}

impl ConnectionHandle {
    /// Open `path`, or an in-memory database for `None` / `":memory:"`.
    ///
    /// # Errors
    /// Returns `SqliteQueueError::ConnectionError` if SQLite cannot open the file.
    pub(crate) fn open(path: Option<&str>) -> Result<Self, SqliteQueueError> {
        let path = path.unwrap_or(MEMORY_PATH);
        let conn = if path == MEMORY_PATH {
            rusqlite::Connection::open_in_memory()
        } else {
            rusqlite::Connection::open(path)
        }
        .map_err(|err| {
            SqliteQueueError::ConnectionError(format!("failed to open {path}: {err}"))
        })?;
        Ok(Self {
            conn,
            path: path.to_owned(),
        })
    }

    /// # Errors
    /// Returns `SqliteQueueError::ConnectionError` if SQLite refuses to close the handle.
    pub(crate) fn close(self) -> Result<(), SqliteQueueError> {
        let path = self.path;
        self.conn.close().map_err(|(_, err)| {
            SqliteQueueError::ConnectionError(format!("failed to close {path}: {err}"))
        })
    }

    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    /// # Errors
    /// Returns `SqliteQueueError::StepError` when SQLite rejects the SQL.
    pub(crate) fn prepare(&self, sql: &str) -> Result<Statement<'_>, SqliteQueueError> {
        let stmt = self.conn.prepare(sql)?;
        let columns = RowColumns::new(
            stmt.column_names()
                .into_iter()
                .map(str::to_owned)
                .collect(),
        );
        Ok(Statement { stmt, columns })
    }

    /// Run one or more statements with no parameters, discarding any rows.
    ///
    /// # Errors
    /// Returns `SqliteQueueError::StepError` on the first failing statement.
    pub(crate) fn execute_batch(&self, sql: &str) -> Result<(), SqliteQueueError> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    /// Issue `PRAGMA name = value` and return the first column of the row SQLite reports
    /// back, if any (`journal_mode` answers with the mode actually in effect).
    ///
    /// # Errors
    /// Returns `SqliteQueueError::StepError` if the pragma fails.
    pub(crate) fn set_pragma(
        &self,
        name: &str,
        value: &str,
    ) -> Result<Option<String>, SqliteQueueError> {
        let reported = match self.pragma_row(&format!("PRAGMA {name} = {value}"))? {
            Some(RowValues::Text(text)) => Some(text),
            Some(RowValues::Int(i)) => Some(i.to_string()),
            _ => None,
        };
        Ok(reported)
    }

    /// Current value of `PRAGMA name`; `Null` for pragmas that report nothing.
    ///
    /// # Errors
    /// Returns `SqliteQueueError::StepError` if the pragma cannot be read.
    pub(crate) fn pragma_value(&self, name: &str) -> Result<RowValues, SqliteQueueError> {
        Ok(self
            .pragma_row(&format!("PRAGMA {name}"))?
            .unwrap_or(RowValues::Null))
    }

    fn pragma_row(&self, sql: &str) -> Result<Option<RowValues>, SqliteQueueError> {
        let mut stmt = self.prepare(sql)?;
        let mut cursor = stmt.cursor();
        let first = match cursor.step()? {
            Step::Row(row) => row.get_by_index(0).cloned(),
            Step::Done => None,
        };
        drop(cursor);
        stmt.finalize()?;
        Ok(first)
    }

    /// # Errors
    /// Returns `SqliteQueueError::StepError` if SQLite rejects the timeout.
    pub(crate) fn set_busy_timeout(&self, timeout: Duration) -> Result<(), SqliteQueueError> {
        self.conn.busy_timeout(timeout)?;
        Ok(())
    }

    pub(crate) fn last_insert_rowid(&self) -> i64 {
        self.conn.last_insert_rowid()
    }

    pub(crate) fn changes(&self) -> u64 {
        self.conn.changes()
    }

    /// Rows changed since the connection opened, triggers included.
    pub(crate) fn total_changes(&self) -> u64 {
        self.conn.total_changes()
    }

    /// `false` while SQLite holds an open transaction on this connection.
    pub(crate) fn is_autocommit(&self) -> bool {
        self.conn.is_autocommit()
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// A prepared statement tied to its connection.
pub(crate) struct Statement<'conn> {
    stmt: rusqlite::Statement<'conn>,
    columns: Arc<RowColumns>,
}

/// Outcome of stepping a statement once.
pub(crate) enum Step {
    Row(Row),
    Done,
}

impl<'conn> Statement<'conn> {
    /// Bind positional values, one per placeholder.
    ///
    /// # Errors
    /// Returns `SqliteQueueError::BindError` when the count differs from the statement's
    /// placeholder count, or `StepError` if SQLite rejects a value.
    pub(crate) fn bind(&mut self, values: &[Value]) -> Result<(), SqliteQueueError> {
        let expected = self.stmt.parameter_count();
        if expected != values.len() {
            return Err(SqliteQueueError::BindError {
                expected,
                actual: values.len(),
            });
        }
        for (idx, value) in values.iter().enumerate() {
            self.stmt.raw_bind_parameter(idx + 1, value)?;
        }
        Ok(())
    }

    /// Start stepping the bound statement.
    pub(crate) fn cursor(&mut self) -> Cursor<'_> {
        Cursor {
            columns: Arc::clone(&self.columns),
            rows: self.stmt.raw_query(),
        }
    }

    /// # Errors
    /// Returns `SqliteQueueError::StepError` if SQLite reports a deferred error on finalize.
    pub(crate) fn finalize(self) -> Result<(), SqliteQueueError> {
        self.stmt.finalize()?;
        Ok(())
    }
}

/// Iteration state over one execution of a statement.
pub(crate) struct Cursor<'stmt> {
    columns: Arc<RowColumns>,
    rows: rusqlite::Rows<'stmt>,
}

impl Cursor<'_> {
    /// Advance the statement by one step.
    ///
    /// # Errors
    /// Returns `SqliteQueueError::StepError` carrying SQLite's code and message.
    pub(crate) fn step(&mut self) -> Result<Step, SqliteQueueError> {
        let Some(row) = self.rows.next()? else {
            return Ok(Step::Done);
        };
        let mut values = Vec::with_capacity(self.columns.len());
        for idx in 0..self.columns.len() {
            values.push(sqlite_extract_value_sync(row, idx)?);
        }
        Ok(Step::Row(Row::new(Arc::clone(&self.columns), values)))
    }

    /// Step until SQLite reports done, keeping every row.
    ///
    /// # Errors
    /// Propagates the first failing step.
    pub(crate) fn collect_rows(&mut self) -> Result<Vec<Row>, SqliteQueueError> {
        let mut rows = Vec::new();
        while let Step::Row(row) = self.step()? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Step until SQLite reports done, discarding rows.
    ///
    /// # Errors
    /// Propagates the first failing step.
    pub(crate) fn drain(&mut self) -> Result<(), SqliteQueueError> {
        while self.rows.next()?.is_some() {}
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_bind_step_finalize_cycle() {
        let handle = ConnectionHandle::open(None).unwrap();
        handle
            .execute_batch("CREATE TABLE t (x INTEGER, y TEXT)")
            .unwrap();

        let mut insert = handle.prepare("INSERT INTO t (x, y) VALUES (?, ?)").unwrap();
        insert
            .bind(&[Value::Integer(5), Value::Text("five".into())])
            .unwrap();
        insert.cursor().drain().unwrap();
        insert.finalize().unwrap();
        assert_eq!(handle.last_insert_rowid(), 1);

        let mut select = handle.prepare("SELECT x, y FROM t").unwrap();
        select.bind(&[]).unwrap();
        let mut cursor = select.cursor();
        let Step::Row(row) = cursor.step().unwrap() else {
            panic!("expected a row");
        };
        assert_eq!(row.column_names(), ["x", "y"]);
        assert!(matches!(cursor.step().unwrap(), Step::Done));
    }

    #[test]
    fn bind_rejects_wrong_arity() {
        let handle = ConnectionHandle::open(Some(":memory:")).unwrap();
        let mut stmt = handle.prepare("SELECT ?, ?").unwrap();
        let err = stmt.bind(&[Value::Integer(1)]).unwrap_err();
        assert!(matches!(
            err,
            SqliteQueueError::BindError {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn open_fails_for_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent").join("db.sqlite");
        let err = ConnectionHandle::open(path.to_str()).unwrap_err();
        assert!(matches!(err, SqliteQueueError::ConnectionError(_)));
    }

    #[test]
    fn journal_mode_pragma_reports_effective_mode() {
        let handle = ConnectionHandle::open(None).unwrap();
        let reported = handle.set_pragma("journal_mode", "WAL").unwrap();
        assert_eq!(reported.as_deref(), Some("memory"));
    }
}

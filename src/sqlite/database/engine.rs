use std::fmt;
use std::sync::Arc;

use crate::config::{EngineOptions, JsonReadOptions, JsonWriteOptions, Pragmas};
use crate::error::SqliteQueueError;
use crate::registry::ModelRegistry;
use crate::schema::{self, Schema};
use crate::sqlite::connection::ConnectionHandle;
use crate::types::RowValues;

/// The engine: one connection plus its transaction and pragma state.
///
/// A `Database` is plain single-owner data. Share it between threads by handing it to a
/// [`DatabaseQueue`](crate::DatabaseQueue), which serializes every unit of work against it.
pub struct Database {
    pub(super) handle: Option<ConnectionHandle>,
    pub(super) path: Option<String>,
    pub(super) in_transaction: bool,
    pub(super) pragmas: Pragmas,
    pub(super) json_write: JsonWriteOptions,
    pub(super) json_read: JsonReadOptions,
    pub(super) registry: Arc<ModelRegistry>,
}

impl Database {
    /// A closed engine configured by `options`. Nothing touches the file until [`open`](Self::open).
    #[must_use]
    pub fn new(options: EngineOptions, registry: Arc<ModelRegistry>) -> Self {
        Self {
            handle: None,
            path: options.path,
            in_transaction: false,
            pragmas: options.pragmas,
            json_write: options.json_write,
            json_read: options.json_read,
            registry,
        }
    }

    /// Construct and open in one step.
    ///
    /// # Errors
    /// Returns `SqliteQueueError::ConnectionError` if the file cannot be opened, or the error of
    /// the first pragma SQLite rejects.
    pub fn open_with(
        options: EngineOptions,
        registry: Arc<ModelRegistry>,
    ) -> Result<Self, SqliteQueueError> {
        let mut db = Self::new(options, registry);
        db.open()?;
        Ok(db)
    }

    /// Open the configured path and apply the pragma settings.
    ///
    /// # Errors
    /// Returns `SqliteQueueError::ConnectionError` when already open or when SQLite cannot open
    /// the file. A rejected pragma closes the handle again and reports the pragma's error.
    pub fn open(&mut self) -> Result<(), SqliteQueueError> {
        if self.handle.is_some() {
            return Err(SqliteQueueError::ConnectionError(format!(
                "database {} is already open",
                self.display_path()
            )));
        }
        let handle = ConnectionHandle::open(self.path.as_deref())?;
        let reported = match self.apply_pragmas(&handle) {
            Ok(reported) => reported,
            Err(err) => {
                if let Err(close_err) = handle.close() {
                    tracing::warn!(error = %close_err, "closing after failed pragma setup");
                }
                return Err(err);
            }
        };
        self.pragmas.journal_mode = reported;
        self.in_transaction = false;
        tracing::debug!(path = handle.path(), pragmas = ?self.pragmas, "database opened");
        self.handle = Some(handle);
        Ok(())
    }

    /// Close the connection, rolling back an open transaction first.
    ///
    /// # Errors
    /// Returns `SqliteQueueError::ConnectionError` when already closed or when SQLite refuses to
    /// release the handle.
    pub fn close(&mut self) -> Result<(), SqliteQueueError> {
        let Some(handle) = self.handle.take() else {
            return Err(SqliteQueueError::ConnectionError(format!(
                "database {} is not open",
                self.display_path()
            )));
        };
        if self.in_transaction || !handle.is_autocommit() {
            tracing::warn!(
                path = handle.path(),
                "closing with an open transaction; rolling back"
            );
            if let Err(err) = handle.execute_batch("ROLLBACK") {
                tracing::warn!(error = %err, "implicit rollback failed");
            }
        }
        self.in_transaction = false;
        tracing::debug!(path = handle.path(), "database closed");
        handle.close()
    }

    /// Configured path; `None` for an in-memory database.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Pragma settings in effect (or to be applied at the next open).
    #[must_use]
    pub fn pragmas(&self) -> &Pragmas {
        &self.pragmas
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn json_write_options(&self) -> JsonWriteOptions {
        self.json_write
    }

    #[must_use]
    pub fn json_read_options(&self) -> JsonReadOptions {
        self.json_read
    }

    pub fn set_json_write_options(&mut self, options: JsonWriteOptions) {
        self.json_write = options;
    }

    pub fn set_json_read_options(&mut self, options: JsonReadOptions) {
        self.json_read = options;
    }

    /// Introspect every user table.
    ///
    /// # Errors
    /// Returns `SqliteQueueError::SchemaError` when closed or when the catalog cannot be read.
    pub fn build_schema(&self) -> Result<Schema, SqliteQueueError> {
        let handle = self.handle.as_ref().ok_or_else(|| {
            SqliteQueueError::SchemaError("cannot introspect a closed database".into())
        })?;
        schema::build_schema(handle)
    }

    /// Current value of any pragma, as SQLite reports it.
    ///
    /// # Errors
    /// Returns `SqliteQueueError::ConnectionError` when closed, or `StepError` from SQLite.
    pub fn pragma_value(&self, name: &str) -> Result<RowValues, SqliteQueueError> {
        self.handle("pragma_value")?.pragma_value(name)
    }

    pub(super) fn handle(&self, ctx: &str) -> Result<&ConnectionHandle, SqliteQueueError> {
        self.handle.as_ref().ok_or_else(|| {
            SqliteQueueError::ConnectionError(format!(
                "database {} is not open ({ctx})",
                self.display_path()
            ))
        })
    }

    /// Follow SQLite's own view of the transaction, which SQL such as `COMMIT` run through the
    /// query surface can change behind the state machine.
    pub(super) fn sync_transaction_state(&mut self) {
        if let Some(handle) = &self.handle {
            self.in_transaction = !handle.is_autocommit();
        }
    }

    fn display_path(&self) -> &str {
        self.path.as_deref().unwrap_or(":memory:")
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if self.handle.is_some() {
            if let Err(err) = self.close() {
                tracing::warn!(error = %err, "error closing database on drop");
            }
        }
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.display_path())
            .field("is_open", &self.is_open())
            .field("in_transaction", &self.in_transaction)
            .field("pragmas", &self.pragmas)
            .finish_non_exhaustive()
    }
}

use super::Database;
use crate::error::SqliteQueueError;
use crate::placeholders::{format_sql, quote_identifier};
use crate::sqlite::params::convert_params;
use crate::types::RowValues;

impl Database {
    /// Bind `params` to the placeholders of `template` and run it to completion.
    ///
    /// Rows the statement produces are drained and discarded. Returns the number of rows
    /// the statement changed; 0 for DDL and queries.
    ///
    /// # Errors
    /// Returns `SqliteQueueError::BindError` on a parameter-count mismatch and `StepError` for
    /// anything SQLite rejects. A failure inside a transaction leaves the transaction open.
    pub fn execute_query(
        &mut self,
        template: &str,
        params: &[RowValues],
    ) -> Result<usize, SqliteQueueError> {
        let values = convert_params(params, self.json_write)?;
        tracing::debug!(sql = template, params = params.len(), "execute_query");
        let result = self.handle("execute_query").and_then(|handle| {
            let before = handle.total_changes();
            let mut stmt = handle.prepare(template)?;
            stmt.bind(&values)?;
            stmt.cursor().drain()?;
            stmt.finalize()?;
            // `changes()` keeps the last DML count across DDL and SELECT.
            if handle.total_changes() == before {
                return Ok(0);
            }
            Ok(usize::try_from(handle.changes()).unwrap_or(usize::MAX))
        });
        self.sync_transaction_state();
        result
    }

    /// Run pre-formatted SQL, possibly several `;`-separated statements, without binding.
    ///
    /// # Errors
    /// Returns `SqliteQueueError::StepError` on the first failing statement.
    pub fn execute_plain_query(&mut self, sql: &str) -> Result<(), SqliteQueueError> {
        tracing::debug!(sql, "execute_plain_query");
        let result = self
            .handle("execute_plain_query")
            .and_then(|handle| handle.execute_batch(sql));
        self.sync_transaction_state();
        result
    }

    /// Rowid of the most recent successful insert on this connection, or 0 if there was none.
    ///
    /// # Errors
    /// Returns `SqliteQueueError::ConnectionError` when closed.
    pub fn last_insert_id(&self) -> Result<i64, SqliteQueueError> {
        Ok(self.handle("last_insert_id")?.last_insert_rowid())
    }

    /// `CREATE [UNIQUE] INDEX IF NOT EXISTS name ON table (column)`.
    ///
    /// # Errors
    /// Returns `SqliteQueueError::StepError` if SQLite rejects the DDL, e.g. an unknown column.
    pub fn create_index(
        &mut self,
        name: &str,
        table: &str,
        column: &str,
        unique: bool,
    ) -> Result<(), SqliteQueueError> {
        let sql = format!(
            "CREATE {}INDEX IF NOT EXISTS {} ON {} ({})",
            if unique { "UNIQUE " } else { "" },
            quote_identifier(name),
            quote_identifier(table),
            quote_identifier(column)
        );
        self.execute_plain_query(&sql)
    }

    /// `DROP INDEX IF EXISTS name`.
    ///
    /// # Errors
    /// Returns `SqliteQueueError::StepError` if SQLite rejects the DDL.
    pub fn drop_index(&mut self, name: &str) -> Result<(), SqliteQueueError> {
        let sql = format!("DROP INDEX IF EXISTS {}", quote_identifier(name));
        self.execute_plain_query(&sql)
    }

    /// Render `template` with literal values in place of its placeholders, using this engine's
    /// JSON write options. Works whether or not the database is open.
    ///
    /// # Errors
    /// Returns `SqliteQueueError::BindError` on a parameter-count mismatch.
    pub fn sql(&self, template: &str, params: &[RowValues]) -> Result<String, SqliteQueueError> {
        format_sql(template, params, self.json_write)
    }
}

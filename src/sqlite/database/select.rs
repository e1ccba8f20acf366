use super::Database;
use crate::error::SqliteQueueError;
use crate::model::{Model, map_row};
use crate::results::Row;
use crate::sqlite::params::convert_params;
use crate::types::RowValues;

impl Database {
    /// Run a query and materialize every row, in result order. The transaction flag is re-read
    /// afterwards, so a `BEGIN` or `COMMIT` sent here shows up in
    /// [`in_transaction`](Self::in_transaction).
    ///
    /// # Errors
    /// Returns `SqliteQueueError::BindError` on a parameter-count mismatch and `StepError` for
    /// anything SQLite rejects.
    pub fn fetch_dictionary(
        &mut self,
        template: &str,
        params: &[RowValues],
    ) -> Result<Vec<Row>, SqliteQueueError> {
        let values = convert_params(params, self.json_write)?;
        tracing::debug!(sql = template, params = params.len(), "fetch_dictionary");
        let result = self.handle("fetch_dictionary").and_then(|handle| {
            let mut stmt = handle.prepare(template)?;
            stmt.bind(&values)?;
            let rows = stmt.cursor().collect_rows()?;
            stmt.finalize()?;
            Ok(rows)
        });
        self.sync_transaction_state();
        result
    }

    /// Run a query and build one `M` per row.
    ///
    /// Columns are found through the key map registered for `M::NAME` (identity when none is
    /// registered) and coerced into each field's declared kind.
    ///
    /// # Errors
    /// Everything [`fetch_dictionary`](Self::fetch_dictionary) reports, plus
    /// `SqliteQueueError::MappingError` when a mapped column is missing or a value does not fit.
    pub fn fetch_object<M: Model>(
        &mut self,
        template: &str,
        params: &[RowValues],
    ) -> Result<Vec<M>, SqliteQueueError> {
        let rows = self.fetch_dictionary(template, params)?;
        let key_map = self.registry.lookup(M::NAME);
        rows.iter()
            .map(|row| map_row::<M>(row, &key_map, self.json_read))
            .collect()
    }
}

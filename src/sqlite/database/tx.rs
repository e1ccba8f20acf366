use super::Database;
use crate::error::SqliteQueueError;

/// Locking behaviour requested by `BEGIN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    Deferred,
    Immediate,
    Exclusive,
}

impl TransactionKind {
    fn begin_sql(self) -> &'static str {
        match self {
            TransactionKind::Deferred => "BEGIN DEFERRED",
            TransactionKind::Immediate => "BEGIN IMMEDIATE",
            TransactionKind::Exclusive => "BEGIN EXCLUSIVE",
        }
    }
}

impl Database {
    /// Begin a deferred transaction.
    ///
    /// # Errors
    /// Returns `SqliteQueueError::StateError` if a transaction is already in progress; nested
    /// transactions are not supported.
    pub fn start_transaction(&mut self) -> Result<(), SqliteQueueError> {
        self.begin(TransactionKind::Deferred)
    }

    /// Begin a transaction that takes the write lock immediately.
    ///
    /// # Errors
    /// Returns `SqliteQueueError::StateError` if a transaction is already in progress, or
    /// `StepError` when the lock cannot be taken within the busy timeout.
    pub fn start_immediate_transaction(&mut self) -> Result<(), SqliteQueueError> {
        self.begin(TransactionKind::Immediate)
    }

    /// Begin a transaction that takes an exclusive lock.
    ///
    /// # Errors
    /// Returns `SqliteQueueError::StateError` if a transaction is already in progress, or
    /// `StepError` when the lock cannot be taken within the busy timeout.
    pub fn start_exclusive_transaction(&mut self) -> Result<(), SqliteQueueError> {
        self.begin(TransactionKind::Exclusive)
    }

    /// Begin a transaction of the given kind.
    ///
    /// # Errors
    /// See [`start_transaction`](Self::start_transaction).
    pub fn begin(&mut self, kind: TransactionKind) -> Result<(), SqliteQueueError> {
        if self.in_transaction {
            return Err(SqliteQueueError::StateError(
                "SQLite transaction already in progress".into(),
            ));
        }
        self.handle("begin")?.execute_batch(kind.begin_sql())?;
        self.in_transaction = true;
        tracing::debug!(?kind, "transaction started");
        Ok(())
    }

    /// Commit the open transaction.
    ///
    /// # Errors
    /// Returns `SqliteQueueError::StateError` if no transaction is active, or `StepError` if
    /// SQLite cannot commit (the transaction then stays open).
    pub fn commit_transaction(&mut self) -> Result<(), SqliteQueueError> {
        self.finish("COMMIT")
    }

    /// Roll back the open transaction.
    ///
    /// # Errors
    /// Returns `SqliteQueueError::StateError` if no transaction is active, or `StepError` if
    /// SQLite cannot roll back.
    pub fn rollback_transaction(&mut self) -> Result<(), SqliteQueueError> {
        self.finish("ROLLBACK")
    }

    fn finish(&mut self, sql: &'static str) -> Result<(), SqliteQueueError> {
        if !self.in_transaction {
            return Err(SqliteQueueError::StateError(
                "SQLite transaction not active".into(),
            ));
        }
        let result = self.handle(sql)?.execute_batch(sql);
        self.sync_transaction_state();
        result?;
        tracing::debug!(statement = sql, "transaction finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::EngineOptions;
    use crate::error::SqliteQueueError;
    use crate::registry::ModelRegistry;
    use crate::sqlite::database::Database;

    fn open() -> Database {
        let db = Database::open_with(EngineOptions::in_memory(), ModelRegistry::shared()).unwrap();
        assert!(!db.in_transaction());
        db
    }

    #[test]
    fn nested_begin_is_rejected() {
        let mut db = open();
        db.start_immediate_transaction().unwrap();
        assert!(db.in_transaction());
        assert!(matches!(
            db.start_exclusive_transaction(),
            Err(SqliteQueueError::StateError(_))
        ));
        assert!(db.in_transaction());
        db.rollback_transaction().unwrap();
        assert!(!db.in_transaction());
    }

    #[test]
    fn commit_and_rollback_while_idle_are_state_errors() {
        let mut db = open();
        assert!(matches!(
            db.commit_transaction(),
            Err(SqliteQueueError::StateError(_))
        ));
        assert!(matches!(
            db.rollback_transaction(),
            Err(SqliteQueueError::StateError(_))
        ));
        assert!(!db.in_transaction());
    }

    #[test]
    fn begin_on_closed_database_fails() {
        let mut db = Database::new(EngineOptions::in_memory(), ModelRegistry::shared());
        assert!(matches!(
            db.start_transaction(),
            Err(SqliteQueueError::ConnectionError(_))
        ));
        assert!(!db.in_transaction());
    }

    #[test]
    fn raw_commit_through_query_surface_is_tracked() {
        let mut db = open();
        db.start_transaction().unwrap();
        db.execute_plain_query("COMMIT").unwrap();
        assert!(!db.in_transaction());
        db.execute_plain_query("BEGIN").unwrap();
        assert!(db.in_transaction());
        db.commit_transaction().unwrap();
    }
}

use std::time::Duration;

use super::Database;
use crate::config::{JournalMode, Pragmas, Synchronous, TemporaryStore};
use crate::error::SqliteQueueError;
use crate::sqlite::connection::ConnectionHandle;
use crate::types::RowValues;

fn on_off(enabled: bool) -> &'static str {
    if enabled { "ON" } else { "OFF" }
}

/// Set `journal_mode` and return the mode SQLite actually switched to. In-memory databases,
/// for example, answer `memory` whatever was requested.
fn apply_journal_mode(
    handle: &ConnectionHandle,
    requested: JournalMode,
) -> Result<JournalMode, SqliteQueueError> {
    let reported = handle.set_pragma("journal_mode", requested.as_sql())?;
    let effective = reported
        .as_deref()
        .and_then(|mode| mode.parse::<JournalMode>().ok())
        .unwrap_or(requested);
    if effective != requested {
        tracing::debug!(%requested, %effective, "journal mode adjusted by SQLite");
    }
    Ok(effective)
}

/// Set `foreign_keys` and return whether enforcement is actually on afterwards.
fn apply_foreign_keys(
    handle: &ConnectionHandle,
    enabled: bool,
) -> Result<bool, SqliteQueueError> {
    handle.set_pragma("foreign_keys", on_off(enabled))?;
    let effective = handle.pragma_value("foreign_keys")? == RowValues::Int(1);
    if effective != enabled {
        tracing::warn!(
            requested = enabled,
            effective,
            "foreign_keys unchanged, SQLite ignores it inside a transaction"
        );
    }
    Ok(effective)
}

impl Database {
    /// Apply every pragma in `self.pragmas`; returns the effective journal mode.
    pub(super) fn apply_pragmas(
        &self,
        handle: &ConnectionHandle,
    ) -> Result<JournalMode, SqliteQueueError> {
        let Pragmas {
            synchronous,
            journal_mode,
            temporary_store,
            busy_timeout,
            foreign_keys,
            case_sensitive_like,
        } = self.pragmas;
        handle.set_busy_timeout(busy_timeout)?;
        let effective = apply_journal_mode(handle, journal_mode)?;
        handle.set_pragma("synchronous", synchronous.as_sql())?;
        handle.set_pragma("temp_store", temporary_store.as_sql())?;
        apply_foreign_keys(handle, foreign_keys)?;
        handle.set_pragma("case_sensitive_like", on_off(case_sensitive_like))?;
        Ok(effective)
    }

    /// # Errors
    /// Returns `SqliteQueueError::StepError` if SQLite rejects the pragma.
    pub fn set_synchronous(&mut self, synchronous: Synchronous) -> Result<(), SqliteQueueError> {
        if let Some(handle) = &self.handle {
            handle.set_pragma("synchronous", synchronous.as_sql())?;
        }
        self.pragmas.synchronous = synchronous;
        Ok(())
    }

    /// Switch the journal mode. While open, the stored setting becomes whatever SQLite reports
    /// back, which can differ from `journal_mode`.
    ///
    /// # Errors
    /// Returns `SqliteQueueError::StepError` if SQLite refuses the change (for instance entering
    /// WAL inside a transaction).
    pub fn set_journal_mode(&mut self, journal_mode: JournalMode) -> Result<(), SqliteQueueError> {
        self.pragmas.journal_mode = match &self.handle {
            Some(handle) => apply_journal_mode(handle, journal_mode)?,
            None => journal_mode,
        };
        Ok(())
    }

    /// # Errors
    /// Returns `SqliteQueueError::StepError` if SQLite rejects the pragma.
    pub fn set_temporary_store(
        &mut self,
        temporary_store: TemporaryStore,
    ) -> Result<(), SqliteQueueError> {
        if let Some(handle) = &self.handle {
            handle.set_pragma("temp_store", temporary_store.as_sql())?;
        }
        self.pragmas.temporary_store = temporary_store;
        Ok(())
    }

    /// # Errors
    /// Returns `SqliteQueueError::StepError` if SQLite rejects the timeout.
    pub fn set_busy_timeout(&mut self, busy_timeout: Duration) -> Result<(), SqliteQueueError> {
        if let Some(handle) = &self.handle {
            handle.set_busy_timeout(busy_timeout)?;
        }
        self.pragmas.busy_timeout = busy_timeout;
        Ok(())
    }

    /// SQLite ignores this pragma inside a transaction. While open, the stored setting is read
    /// back from SQLite, so a request made inside a transaction leaves it unchanged.
    ///
    /// # Errors
    /// Returns `SqliteQueueError::StepError` if SQLite rejects the pragma.
    pub fn set_foreign_keys_enabled(&mut self, enabled: bool) -> Result<(), SqliteQueueError> {
        self.pragmas.foreign_keys = match &self.handle {
            Some(handle) => apply_foreign_keys(handle, enabled)?,
            None => enabled,
        };
        Ok(())
    }

    /// # Errors
    /// Returns `SqliteQueueError::StepError` if SQLite rejects the pragma.
    pub fn set_case_sensitive_like(&mut self, enabled: bool) -> Result<(), SqliteQueueError> {
        if let Some(handle) = &self.handle {
            handle.set_pragma("case_sensitive_like", on_off(enabled))?;
        }
        self.pragmas.case_sensitive_like = enabled;
        Ok(())
    }
}

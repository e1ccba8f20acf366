//! Convenient imports for common functionality.
//!
//! This module re-exports the types most callers need to open a queue, run SQL and map rows.

pub use crate::config::{
    EngineOptions, JournalMode, JsonReadOptions, JsonWriteOptions, Pragmas, Synchronous,
    TemporaryStore,
};
pub use crate::error::SqliteQueueError;
pub use crate::model::{FieldKind, FieldSpec, FieldValues, Model};
pub use crate::placeholders::format_sql;
pub use crate::queue::DatabaseQueue;
pub use crate::registry::{KeyMap, ModelRegistry};
pub use crate::results::Row;
pub use crate::schema::{ColumnType, Schema};
pub use crate::sqlite::Database;
pub use crate::types::RowValues;

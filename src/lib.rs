//! Serialized single-connection `SQLite` access.
//!
//! A [`Database`] owns one connection, its transaction state and its pragma settings. A
//! [`DatabaseQueue`] moves a `Database` onto its own worker thread so any number of callers can
//! share it, one unit of work at a time, in submission order. Result rows come back either as
//! [`Row`]s or as typed values built through the [`Model`] trait, with column names translated
//! by the [`KeyMap`]s held in a [`ModelRegistry`].
//!
//! ```rust
//! use sqlite_queue::prelude::*;
//!
//! let queue = DatabaseQueue::open(EngineOptions::in_memory(), ModelRegistry::shared()).unwrap();
//! let rows = queue
//!     .submit_sync(|db| {
//!         db.execute_plain_query("CREATE TABLE t (x INTEGER)")?;
//!         db.start_transaction()?;
//!         db.execute_query("INSERT INTO t (x) VALUES (?)", &[RowValues::Int(5)])?;
//!         db.commit_transaction()?;
//!         db.fetch_dictionary("SELECT x FROM t", &[])
//!     })
//!     .unwrap();
//! assert_eq!(rows[0].get("x"), Some(&RowValues::Int(5)));
//! ```

pub mod config;
pub mod error;
pub mod model;
pub mod placeholders;
pub mod prelude;
pub mod queue;
pub mod registry;
pub mod results;
pub mod schema;
mod sqlite;
pub mod types;

pub use config::{
    EngineOptions, EngineOptionsBuilder, JournalMode, JsonReadOptions, JsonWriteOptions, Pragmas,
    Synchronous, TemporaryStore,
};
pub use error::SqliteQueueError;
pub use model::{FieldKind, FieldSpec, FieldValue, FieldValues, FromFieldValue, Model};
pub use queue::DatabaseQueue;
pub use registry::{KeyMap, ModelRegistry};
pub use results::Row;
pub use schema::{ColumnDescriptor, ColumnType, Schema, TableDescriptor};
pub use sqlite::{Database, TransactionKind};
pub use types::RowValues;

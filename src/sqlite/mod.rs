// SQLite engine.
//
// - connection: owner of the rusqlite handle (prepare / bind / step / finalize)
// - params: `RowValues` → bound SQLite values
// - query: SQLite values → `RowValues`
// - database: the engine with its transaction and pragma state machine

pub(crate) mod connection;
mod database;
pub(crate) mod params;
mod query;

pub use database::{Database, TransactionKind};

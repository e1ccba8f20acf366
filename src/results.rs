//! Materialized result rows.

mod row;

pub use row::{Row, RowColumns};

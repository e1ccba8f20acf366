mod dml;
mod engine;
mod pragma;
mod select;
mod tx;

pub use engine::Database;
pub use tx::TransactionKind;

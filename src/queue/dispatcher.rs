use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::Receiver;

use crate::error::SqliteQueueError;
use crate::sqlite::Database;

use super::channel::Command;

/// Worker loop: run jobs in arrival order until `Shutdown` or every sender is gone, then
/// close the database.
pub(super) fn run_queue_worker(mut db: Database, receiver: &Receiver<Command>) {
    let mut served: u64 = 0;
    while let Ok(command) = receiver.recv() {
        match command {
            Command::Run(job) => {
                job(&mut db);
                served = served.saturating_add(1);
            }
            Command::Shutdown => break,
        }
    }
    tracing::debug!(served, "queue worker stopping");
    if db.is_open() {
        if let Err(err) = db.close() {
            tracing::warn!(error = %err, "failed to close database on queue shutdown");
        }
    }
}

/// Run `work`, turning a panic into `WorkPanicked` so the worker survives it.
pub(super) fn run_guarded<R>(
    db: &mut Database,
    work: impl FnOnce(&mut Database) -> Result<R, SqliteQueueError>,
) -> Result<R, SqliteQueueError> {
    match panic::catch_unwind(AssertUnwindSafe(|| work(db))) {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(&*payload);
            tracing::warn!(%message, in_transaction = db.in_transaction(), "unit of work panicked");
            Err(SqliteQueueError::WorkPanicked(message))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".into())
}

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle, ThreadId};

use crate::error::SqliteQueueError;
use crate::sqlite::Database;

use super::channel::{Command, Job};
use super::dispatcher::run_queue_worker;

static NEXT_QUEUE_ID: AtomicU64 = AtomicU64::new(1);

/// The worker thread that owns one `Database`.
pub(super) struct QueueWorker {
    sender: Sender<Command>,
    thread_id: ThreadId,
    join: Option<JoinHandle<()>>,
}

impl QueueWorker {
    pub(super) fn spawn(db: Database) -> Result<Self, SqliteQueueError> {
        let (sender, receiver) = mpsc::channel::<Command>();
        let queue_id = NEXT_QUEUE_ID.fetch_add(1, Ordering::Relaxed);
        let join = thread::Builder::new()
            .name(format!("sqlite-queue-{queue_id}"))
            .spawn(move || run_queue_worker(db, &receiver))
            .map_err(|err| {
                SqliteQueueError::QueueError(format!("failed to spawn queue worker thread: {err}"))
            })?;
        tracing::debug!(queue_id, "queue worker started");
        Ok(Self {
            sender,
            thread_id: join.thread().id(),
            join: Some(join),
        })
    }

    /// `true` when called from inside a running unit of work.
    pub(super) fn is_worker_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    pub(super) fn send(&self, job: Job) -> Result<(), SqliteQueueError> {
        self.sender
            .send(Command::Run(job))
            .map_err(|_| queue_error("queue worker has stopped"))
    }
}

impl Drop for QueueWorker {
    fn drop(&mut self) {
        let _ = self.sender.send(Command::Shutdown);
        // The last handle can be released by a unit of work; the worker cannot join itself.
        if self.is_worker_thread() {
            return;
        }
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                tracing::warn!("queue worker thread panicked");
            }
        }
    }
}

pub(super) fn queue_error(message: &str) -> SqliteQueueError {
    SqliteQueueError::QueueError(message.into())
}

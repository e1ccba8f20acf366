//! Serial access to one database from any number of threads or tasks.
//!
//! A [`DatabaseQueue`] moves its [`Database`] onto a dedicated worker thread. Units of work are
//! closures over `&mut Database`; they run one at a time, in the order they were submitted,
//! whether the submitter blocks ([`submit_sync`](DatabaseQueue::submit_sync)), fires and
//! forgets ([`submit_async`](DatabaseQueue::submit_async)) or awaits
//! ([`submit`](DatabaseQueue::submit)).
//!
//! ```rust
//! use sqlite_queue::prelude::*;
//!
//! let queue = DatabaseQueue::open(EngineOptions::in_memory(), ModelRegistry::shared()).unwrap();
//! queue
//!     .submit_sync(|db| db.execute_plain_query("CREATE TABLE t (x INTEGER)"))
//!     .unwrap();
//! queue
//!     .submit_async(|db| {
//!         let _ = db.execute_query("INSERT INTO t (x) VALUES (?)", &[RowValues::Int(1)]);
//!     })
//!     .unwrap();
//! let rows = queue
//!     .submit_sync(|db| db.fetch_dictionary("SELECT x FROM t", &[]))
//!     .unwrap();
//! assert_eq!(rows.len(), 1);
//! ```

mod channel;
mod dispatcher;
mod manager;

use std::fmt;
use std::sync::{Arc, mpsc};

use tokio::sync::oneshot;

use crate::config::EngineOptions;
use crate::error::SqliteQueueError;
use crate::registry::ModelRegistry;
use crate::sqlite::Database;

use channel::Job;
use dispatcher::run_guarded;
use manager::{QueueWorker, queue_error};

/// Handle to a serial execution queue. Clones share the same worker and database; the worker
/// shuts down once the last handle is dropped and everything queued before that has run.
#[derive(Clone)]
pub struct DatabaseQueue {
    worker: Arc<QueueWorker>,
    path: Option<String>,
}

impl DatabaseQueue {
    /// Open the database on the calling thread, then hand it to a new worker thread.
    ///
    /// # Errors
    /// Returns the engine's open error (`ConnectionError`, or a pragma's `StepError`), or
    /// `SqliteQueueError::QueueError` if the worker thread cannot be spawned.
    pub fn open(
        options: EngineOptions,
        registry: Arc<ModelRegistry>,
    ) -> Result<Self, SqliteQueueError> {
        Self::from_database(Database::open_with(options, registry)?)
    }

    /// Serve an existing engine. It may be open or closed; work sees it as is.
    ///
    /// # Errors
    /// Returns `SqliteQueueError::QueueError` if the worker thread cannot be spawned.
    pub fn from_database(db: Database) -> Result<Self, SqliteQueueError> {
        let path = db.path().map(str::to_owned);
        Ok(Self {
            worker: Arc::new(QueueWorker::spawn(db)?),
            path,
        })
    }

    /// Path of the served database; `None` for in-memory.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Run `work` and block until it has finished, returning its result.
    ///
    /// # Errors
    /// Returns whatever `work` returns, `SqliteQueueError::WorkPanicked` if it panicked,
    /// `Reentrant` when called from inside another unit of work on this queue, or `QueueError`
    /// if the worker is gone.
    pub fn submit_sync<F, R>(&self, work: F) -> Result<R, SqliteQueueError>
    where
        F: FnOnce(&mut Database) -> Result<R, SqliteQueueError> + Send + 'static,
        R: Send + 'static,
    {
        if self.worker.is_worker_thread() {
            return Err(SqliteQueueError::Reentrant);
        }
        let (reply, response) = mpsc::sync_channel(1);
        self.worker.send(Box::new(move |db: &mut Database| {
            let _ = reply.send(run_guarded(db, work));
        }))?;
        response
            .recv()
            .map_err(|_| queue_error("queue worker dropped a synchronous unit of work"))?
    }

    /// Enqueue `work` and return at once. Failures inside `work` are its own to handle.
    ///
    /// # Errors
    /// Returns `SqliteQueueError::QueueError` if the worker is gone.
    pub fn submit_async<F>(&self, work: F) -> Result<(), SqliteQueueError>
    where
        F: FnOnce(&mut Database) + Send + 'static,
    {
        let job: Job = Box::new(move |db: &mut Database| {
            let _ = run_guarded(db, |db| {
                work(db);
                Ok(())
            });
        });
        self.worker.send(job)
    }

    /// Run `work` and await its result without blocking the executor.
    ///
    /// # Errors
    /// Same as [`submit_sync`](Self::submit_sync), except that reentrancy is not checked.
    pub async fn submit<F, R>(&self, work: F) -> Result<R, SqliteQueueError>
    where
        F: FnOnce(&mut Database) -> Result<R, SqliteQueueError> + Send + 'static,
        R: Send + 'static,
    {
        self.request(move |respond_to| {
            let job: Job = Box::new(move |db: &mut Database| {
                let _ = respond_to.send(run_guarded(db, work));
            });
            job
        })
        .await
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T, SqliteQueueError>>) -> Job,
    ) -> Result<T, SqliteQueueError> {
        let (tx, rx) = oneshot::channel();
        self.worker.send(build(tx))?;
        rx.await
            .map_err(|_| queue_error("queue worker dropped an awaited unit of work"))?
    }
}

impl fmt::Debug for DatabaseQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseQueue")
            .field("path", &self.path.as_deref().unwrap_or(":memory:"))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    fn queue() -> DatabaseQueue {
        DatabaseQueue::open(EngineOptions::in_memory(), ModelRegistry::shared()).unwrap()
    }

    #[test]
    fn sync_submission_waits_behind_async_work() {
        let queue = queue();
        let log = Arc::new(Mutex::new(Vec::new()));
        for i in 0..5 {
            let log = Arc::clone(&log);
            queue
                .submit_async(move |_| log.lock().unwrap().push(i))
                .unwrap();
        }
        let seen = Arc::clone(&log);
        let snapshot = queue
            .submit_sync(move |_| Ok(seen.lock().unwrap().clone()))
            .unwrap();
        assert_eq!(snapshot, [0, 1, 2, 3, 4]);
    }

    #[test]
    fn reentrant_sync_submission_is_rejected() {
        let queue = queue();
        let inner = queue.clone();
        let outcome = queue
            .submit_sync(move |_| Ok(inner.submit_sync(|_| Ok(()))))
            .unwrap();
        assert!(matches!(outcome, Err(SqliteQueueError::Reentrant)));
    }

    #[test]
    fn panicking_work_does_not_stop_the_queue() {
        let queue = queue();
        let err = queue
            .submit_sync(|_| -> Result<(), SqliteQueueError> { panic!("unit of work failed") })
            .unwrap_err();
        assert!(matches!(err, SqliteQueueError::WorkPanicked(ref m) if m == "unit of work failed"));
        queue.submit_async(|_| panic!("async failure")).unwrap();
        assert!(queue.submit_sync(|db| Ok(db.is_open())).unwrap());
    }

    #[test]
    fn last_handle_dropped_inside_work_does_not_deadlock() {
        let (go_tx, go_rx) = mpsc::channel::<()>();
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let queue = queue();
        let held = queue.clone();
        queue
            .submit_async(move |_| {
                go_rx.recv().unwrap();
                drop(held);
                done_tx.send(()).unwrap();
            })
            .unwrap();
        drop(queue);
        go_tx.send(()).unwrap();
        done_rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .unwrap();
    }

    #[tokio::test]
    async fn awaited_submission_returns_the_value() {
        let queue = queue();
        queue
            .submit(|db| db.execute_plain_query("CREATE TABLE t (x INTEGER)"))
            .await
            .unwrap();
        let changed = queue
            .submit(|db| db.execute_query("INSERT INTO t VALUES (1), (2)", &[]))
            .await
            .unwrap();
        assert_eq!(changed, 2);
    }
}

//! A bounded worker pool: spawn jobs up to a concurrency cap, fill-then-
//! drain the cap as jobs finish, carry a shared first-error slot and
//! cooperative cancellation.
//!
//! Grounded on `cuenv-core`'s `tasks::executor::execute_graph` and
//! `execute_parallel`: both spawn onto a `tokio::task::JoinSet`, and once
//! its length reaches `max_parallel` they `join_next().await` one result
//! before spawning more, rather than capping via a semaphore. This pool
//! generalizes that same fill-and-drain loop to an open-ended stream of
//! jobs scheduled one at a time, instead of one fixed batch per call.

use crate::error::{Error, Result};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

/// A handle passed into a job's closure: its worker slot id, a place to
/// post human-readable status text, and the pool's cancellation token.
#[derive(Clone)]
pub struct WorkerHandle {
    id: usize,
    status: Arc<StdMutex<String>>,
    cancel: CancellationToken,
}

impl WorkerHandle {
    /// This worker slot's numeric id (stable for the lifetime of the pool,
    /// not of any one job).
    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Post a short status string, e.g. for a progress UI. Overwrites
    /// whatever was posted before.
    pub fn status(&self, text: impl Into<String>) {
        *self.status.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = text.into();
    }

    /// The last status text posted for this slot.
    #[must_use]
    pub fn current_status(&self) -> String {
        self.status
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// The pool's shared cancellation token. Long-running jobs should poll
    /// this (or `tokio::select!` against `cancelled()`) to stop early.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Shorthand for `cancellation_token().is_cancelled()`.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// One unit of work: an id, the ids of jobs it depends on (informational --
/// the pool itself does not order by dependency; callers schedule jobs in
/// an order that already respects them), a closure, and the output channel
/// its result is delivered on.
pub struct Job<T> {
    id: String,
    deps: Vec<String>,
    work: Box<dyn FnOnce(WorkerHandle) -> BoxFuture<T> + Send>,
}

impl<T: Send + 'static> Job<T> {
    /// Build a job from its id, dependency ids, and a closure that receives
    /// a [`WorkerHandle`] and produces the job's result.
    pub fn new<F, Fut>(id: impl Into<String>, deps: Vec<String>, work: F) -> Self
    where
        F: FnOnce(WorkerHandle) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            id: id.into(),
            deps,
            work: Box::new(move |handle| Box::pin(work(handle))),
        }
    }

    /// This job's id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Ids of jobs this one depends on.
    #[must_use]
    pub fn deps(&self) -> &[String] {
        &self.deps
    }
}

struct Inner {
    max_parallel: usize,
    join_set: Mutex<JoinSet<()>>,
    cancel: CancellationToken,
    first_error: StdMutex<Option<Error>>,
    next_worker_id: AtomicUsize,
}

/// A bounded pool of concurrently running jobs. Cheap to clone; clones
/// share the same queue, cancellation token, and error slot.
#[derive(Clone)]
pub struct WorkerPool(Arc<Inner>);

impl WorkerPool {
    /// Build a pool that runs at most `max_parallel` jobs concurrently.
    /// `0` means unbounded.
    #[must_use]
    pub fn new(max_parallel: usize) -> Self {
        Self(Arc::new(Inner {
            max_parallel,
            join_set: Mutex::new(JoinSet::new()),
            cancel: CancellationToken::new(),
            first_error: StdMutex::new(None),
            next_worker_id: AtomicUsize::new(0),
        }))
    }

    /// The pool's shared cancellation token.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.0.cancel.clone()
    }

    /// Trigger cooperative cancellation for every running and future job.
    pub fn cancel(&self) {
        self.0.cancel.cancel();
    }

    /// Whether the pool has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.cancel.is_cancelled()
    }

    /// The first job error recorded, if any. Subsequent failures are
    /// dropped -- only the first is kept, for callers that want a single
    /// representative error to report once everything has run.
    #[must_use]
    pub fn first_error(&self) -> Option<Error> {
        self.0
            .first_error
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// A job's own failure only cancels jobs downstream of it -- scoping
    /// that is the scheduler's job, since only it knows the dependency
    /// graph. The pool itself never cancels on error; a caller that does
    /// want every remaining job stopped should call [`Self::cancel`]
    /// explicitly.
    fn record_error(&self, error: Error) {
        let mut slot = self
            .0
            .first_error
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(error);
        }
    }

    /// Schedule `job`, blocking only long enough to stay within
    /// `max_parallel` (by draining one finished job first, same as the
    /// fill-then-drain loop this is grounded on). Returns a receiver for
    /// the job's result.
    pub async fn schedule<T: Send + 'static>(&self, job: Job<T>) -> oneshot::Receiver<Result<T>> {
        let (tx, rx) = oneshot::channel();

        let mut join_set = self.0.join_set.lock().await;
        if self.0.max_parallel > 0 {
            while join_set.len() >= self.0.max_parallel {
                if let Some(finished) = join_set.join_next().await {
                    self.handle_join_result(finished);
                } else {
                    break;
                }
            }
        }

        let worker_id = self.0.next_worker_id.fetch_add(1, Ordering::SeqCst);
        let handle = WorkerHandle {
            id: worker_id,
            status: Arc::new(StdMutex::new(String::new())),
            cancel: self.0.cancel.clone(),
        };
        let job_id = job.id.clone();
        let work = job.work;
        let pool = self.clone();

        join_set.spawn(async move {
            if handle.is_cancelled() {
                let _ = tx.send(Err(Error::Cancelled));
                return;
            }
            let result = work(handle).await;
            if let Err(ref e) = result {
                pool.record_error(e.clone());
            }
            let _ = tx.send(result);
        });
        drop(join_set);

        rx
    }

    fn handle_join_result(&self, result: std::result::Result<(), tokio::task::JoinError>) {
        if let Err(join_err) = result {
            if join_err.is_panic() {
                self.record_error(Error::JobPanicked {
                    job_id: "unknown".to_string(),
                    message: join_err.to_string(),
                });
            }
        }
    }

    /// Drain every job scheduled so far, waiting for each to complete. Call
    /// this once the caller is done calling [`Self::schedule`] to block
    /// until the whole batch has finished.
    pub async fn done(&self) {
        let mut join_set = self.0.join_set.lock().await;
        while let Some(result) = join_set.join_next().await {
            self.handle_join_result(result);
        }
    }
}

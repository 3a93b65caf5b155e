//! Bounded worker pool for running scheduled jobs.
//!
//! [`WorkerPool`] bounds concurrency the way `cuenv-core`'s task executor
//! does: fill a `JoinSet` up to a cap, drain one result before spawning
//! more. On top of that it adds a shared first-error slot, cooperative
//! cancellation via [`tokio_util::sync::CancellationToken`], and a
//! [`WaitGroup`] for callers (e.g. a scheduler juggling several pools) that
//! need a plain "block until N things finish" primitive independent of any
//! one pool.

mod error;
mod pool;
mod wait_group;

pub use error::{Error, Result};
pub use pool::{Job, WorkerHandle, WorkerPool};
pub use wait_group::WaitGroup;

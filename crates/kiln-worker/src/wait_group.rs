//! A Go-style `WaitGroup`: add expected work up front, mark it done as it
//! completes, block until the count reaches zero.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::Notify;

struct Inner {
    count: AtomicI64,
    notify: Notify,
}

/// A cloneable handle to one wait group. Every clone observes the same
/// counter.
#[derive(Clone)]
pub struct WaitGroup(Arc<Inner>);

impl WaitGroup {
    /// A wait group with nothing outstanding yet.
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(Inner {
            count: AtomicI64::new(0),
            notify: Notify::new(),
        }))
    }

    /// Register `n` additional units of outstanding work.
    pub fn add(&self, n: i64) {
        self.0.count.fetch_add(n, Ordering::SeqCst);
    }

    /// Mark one unit of work done. Wakes any waiters once the count reaches
    /// zero.
    pub fn done(&self) {
        let remaining = self.0.count.fetch_sub(1, Ordering::SeqCst) - 1;
        if remaining <= 0 {
            self.0.notify.notify_waiters();
        }
    }

    /// Block until the outstanding count reaches zero.
    pub async fn wait(&self) {
        loop {
            if self.0.count.load(Ordering::SeqCst) <= 0 {
                return;
            }
            let notified = self.0.notify.notified();
            if self.0.count.load(Ordering::SeqCst) <= 0 {
                return;
            }
            notified.await;
        }
    }

    /// Current outstanding count, for diagnostics.
    #[must_use]
    pub fn count(&self) -> i64 {
        self.0.count.load(Ordering::SeqCst)
    }
}

impl Default for WaitGroup {
    fn default() -> Self {
        Self::new()
    }
}

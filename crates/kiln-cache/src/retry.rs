//! Retry with exponential backoff for external cache tier transport.
//!
//! Ported from `cuenv-remote`'s `retry_with_backoff`: a manual loop over
//! `backoff::backoff::Backoff::next_backoff()` rather than
//! `backoff::future::retry`, so the crate only needs the base `backoff`
//! dependency. Cache tier failures are never fatal on their own -- callers
//! fall through to the next tier -- so this only bounds how long a single
//! tier is given before that fallthrough happens.

use backoff::{ExponentialBackoff, ExponentialBackoffBuilder, backoff::Backoff};
use std::time::Duration;
use tracing::debug;

const MAX_ATTEMPTS: u32 = 4;

fn new_backoff() -> ExponentialBackoff {
    ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_millis(100))
        .with_max_interval(Duration::from_secs(2))
        .with_max_elapsed_time(Some(Duration::from_secs(10)))
        .build()
}

/// Retry a fallible async operation with exponential backoff, bounded by
/// both `MAX_ATTEMPTS` and the backoff's own max elapsed time.
pub async fn retry_with_backoff<F, Fut, T, E>(operation_name: &str, mut f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut backoff = new_backoff();
    let mut attempts = 0;

    loop {
        attempts += 1;
        match f().await {
            Ok(result) => return Ok(result),
            Err(err) => {
                if attempts >= MAX_ATTEMPTS {
                    return Err(err);
                }
                match backoff.next_backoff() {
                    Some(duration) => {
                        debug!(
                            operation = operation_name,
                            attempts, error = %err, retry_in_ms = duration.as_millis(),
                            "tier operation failed, retrying"
                        );
                        tokio::time::sleep(duration).await;
                    }
                    None => return Err(err),
                }
            }
        }
    }
}

//! Request slot limiter with per-slot pacing
//!
//! At most `K` requests hold a slot at once, and each slot stays occupied for
//! at least `min_interval`, capping throughput at `K / min_interval`.

use crate::FetchError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

/// A held request slot
///
/// The slot is released when the token is dropped, so an early return or a
/// cancelled future still frees it.
#[derive(Debug)]
pub struct RateLimitToken {
    _permit: OwnedSemaphorePermit,
}

/// Bounded-concurrency limiter shared by every fetch of a harvest
#[derive(Debug, Clone)]
pub struct RateLimiter {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
    min_interval: Duration,
}

impl RateLimiter {
    /// Creates a limiter with `max_concurrent` slots, each held for at least `min_interval`
    pub fn new(max_concurrent: usize, min_interval: Duration) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            min_interval,
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Number of slots currently free
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Waits until a slot is free and takes it
    pub async fn acquire(&self) -> Result<RateLimitToken, FetchError> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| FetchError::LimiterClosed)?;
        Ok(RateLimitToken { _permit: permit })
    }

    /// Releases a slot once it has been held for `min_interval`
    ///
    /// `elapsed` is how long the request took. When it already covers the
    /// interval the slot is freed immediately.
    pub async fn release_after_pacing(&self, token: RateLimitToken, elapsed: Duration) {
        if let Some(remaining) = self.min_interval.checked_sub(elapsed) {
            if !remaining.is_zero() {
                tracing::trace!("Holding request slot for another {:?}", remaining);
                tokio::time::sleep(remaining).await;
            }
        }
        drop(token);
    }

    /// Runs `request` inside a paced slot
    ///
    /// The slot is paced on success and on failure alike.
    pub async fn paced<F, T>(&self, request: F) -> Result<T, FetchError>
    where
        F: Future<Output = Result<T, FetchError>>,
    {
        let token = self.acquire().await?;
        let start = Instant::now();
        let result = request.await;
        self.release_after_pacing(token, start.elapsed()).await;
        result
    }
}

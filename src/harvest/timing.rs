//! Hooks wrapped around a harvest entry point
//!
//! An [`Interceptor`] sees the label of the wrapped operation before it
//! starts and its elapsed time once it settles. [`TimingInterceptor`] logs
//! the duration of a whole harvest.

use std::future::Future;
use std::time::{Duration, Instant};

/// Observes the start and end of an intercepted operation
pub trait Interceptor {
    fn before(&self, _label: &str) {}

    fn after(&self, label: &str, elapsed: Duration);
}

/// Logs how long the intercepted operation took
#[derive(Debug, Default, Clone, Copy)]
pub struct TimingInterceptor;

impl Interceptor for TimingInterceptor {
    fn before(&self, label: &str) {
        tracing::debug!("Starting {:?}", label);
    }

    fn after(&self, label: &str, elapsed: Duration) {
        tracing::info!("Finished {:?} in {:.4} secs", label, elapsed.as_secs_f64());
    }
}

/// Runs `operation` between the interceptor's hooks
pub async fn intercept<I, F>(interceptor: &I, label: &str, operation: F) -> F::Output
where
    I: Interceptor + ?Sized,
    F: Future,
{
    interceptor.before(label);
    let start = Instant::now();
    let output = operation.await;
    interceptor.after(label, start.elapsed());
    output
}

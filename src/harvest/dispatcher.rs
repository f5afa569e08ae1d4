//! Background persistence of finished batches
//!
//! Each dispatched batch is stored on the blocking pool while the harvest
//! moves on. Every handle stays in one list until [`SinkDispatcher::join_all`]
//! drains it, so no write can finish unobserved.

use crate::storage::{RecordSink, SinkError};
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// A persistence operation that did not succeed
#[derive(Debug)]
pub struct SinkFailure {
    pub batch: usize,
    pub records: usize,
    pub error: SinkError,
}

/// Settled state of every dispatched batch
#[derive(Debug, Default)]
pub struct DispatchSummary {
    pub batches: usize,
    pub records_stored: usize,
    pub failures: Vec<SinkFailure>,
}

struct PendingStore {
    batch: usize,
    records: usize,
    handle: JoinHandle<Result<(), SinkError>>,
}

/// Starts sink writes without waiting for them and tracks their handles
pub struct SinkDispatcher<T, S> {
    sink: Arc<S>,
    pending: Vec<PendingStore>,
    _records: PhantomData<fn(T)>,
}

impl<T, S> SinkDispatcher<T, S>
where
    T: Send + 'static,
    S: RecordSink<T> + 'static,
{
    pub fn new(sink: Arc<S>) -> Self {
        Self {
            sink,
            pending: Vec::new(),
            _records: PhantomData,
        }
    }

    /// Number of dispatched batches not yet joined
    pub fn outstanding(&self) -> usize {
        self.pending.len()
    }

    /// Starts storing `records` for batch `batch` and returns immediately
    pub fn dispatch(&mut self, batch: usize, records: Vec<T>) {
        let sink = Arc::clone(&self.sink);
        let count = records.len();
        tracing::debug!("Dispatching {} records of batch {}", count, batch);

        let handle = tokio::task::spawn_blocking(move || sink.store(&records));
        self.pending.push(PendingStore {
            batch,
            records: count,
            handle,
        });
    }

    /// Waits for every dispatched write and collects the failures
    pub async fn join_all(&mut self) -> DispatchSummary {
        let mut summary = DispatchSummary::default();

        for pending in self.pending.drain(..) {
            summary.batches += 1;
            let outcome = match pending.handle.await {
                Ok(result) => result,
                Err(e) => Err(SinkError::Task {
                    batch: pending.batch,
                    message: e.to_string(),
                }),
            };

            match outcome {
                Ok(()) => summary.records_stored += pending.records,
                Err(error) => {
                    tracing::error!("Failed to store batch {}: {}", pending.batch, error);
                    summary.failures.push(SinkFailure {
                        batch: pending.batch,
                        records: pending.records,
                        error,
                    });
                }
            }
        }

        summary
    }
}

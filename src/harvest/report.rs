//! Outcome of a harvest run
//!
//! Every batch either reaches the sink or is recorded as a [`BatchFailure`]
//! with the stage it failed in. Primaries answered with anything but
//! `200 OK` are listed as dropped and only count against the run when
//! `report_dropped` is set.

use std::fmt;

/// Stage of a batch at which it failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Resolving,
    Building,
    Storing,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Resolving => "resolving links",
            Self::Building => "building records",
            Self::Storing => "storing records",
        };
        f.write_str(name)
    }
}

/// A batch that did not make it to storage
#[derive(Debug, Clone)]
pub struct BatchFailure {
    pub batch: usize,
    pub stage: FailureStage,
    pub message: String,
}

/// A primary resource that was left out of its batch
#[derive(Debug, Clone)]
pub struct DroppedResource {
    pub id: u32,
    pub reason: String,
}

/// Outcome of a whole harvest
#[derive(Debug, Clone, Default)]
pub struct HarvestReport {
    pub batches: usize,
    /// Primaries answered with `200 OK`
    pub primaries_fetched: usize,
    pub dropped: Vec<DroppedResource>,
    pub links_fetched: usize,
    pub records_dispatched: usize,
    pub records_stored: usize,
    pub failures: Vec<BatchFailure>,
    /// Whether dropped primaries make the harvest incomplete
    pub count_dropped: bool,
}

impl HarvestReport {
    /// True when every batch was stored and, if configured, nothing was dropped
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && !(self.count_dropped && !self.dropped.is_empty())
    }

    pub fn log_summary(&self) {
        tracing::info!(
            "Harvested {} batches: {} resources fetched, {} dropped, {} linked resources, {}/{} records stored",
            self.batches,
            self.primaries_fetched,
            self.dropped.len(),
            self.links_fetched,
            self.records_stored,
            self.records_dispatched
        );
        for failure in &self.failures {
            tracing::error!(
                "Batch {} failed while {}: {}",
                failure.batch,
                failure.stage,
                failure.message
            );
        }
    }
}

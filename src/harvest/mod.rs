//! Harvest module: the rate-limited, link-resolving batch pipeline
//!
//! This module contains the core harvesting logic, including:
//! - Request slot limiting with per-request pacing
//! - Rate-limited JSON fetching
//! - Per-batch link discovery, deduplication and substitution
//! - Batch orchestration with background persistence

mod dispatcher;
mod fetcher;
mod orchestrator;
mod rate_limiter;
mod report;
mod resolver;
mod timing;

pub use dispatcher::{DispatchSummary, SinkDispatcher, SinkFailure};
pub use fetcher::{build_http_client, FetchResult, Fetcher};
pub use orchestrator::{partition_batches, primary_url, Harvester};
pub use rate_limiter::{RateLimitToken, RateLimiter};
pub use report::{BatchFailure, DroppedResource, FailureStage, HarvestReport};
pub use resolver::{
    discover, resolve, substitute, LinkFieldSpec, PendingLinkMap, PrimaryResource, Resolution,
    ResolvedLinks,
};
pub use timing::{intercept, Interceptor, TimingInterceptor};

use crate::config::Config;
use crate::record::FromRecord;
use crate::storage::RecordSink;
use crate::HarvestError;
use std::sync::Arc;

/// Runs a complete harvest operation
///
/// This is the main entry point for a harvest. It will:
/// 1. Build the HTTP client and rate limiter
/// 2. Split the id range into batches
/// 3. Fetch, resolve and build each batch in turn
/// 4. Store finished batches in the background
/// 5. Wait for every write before returning the report
///
/// The run is wrapped in a [`TimingInterceptor`].
pub async fn harvest<T, S>(config: &Config, sink: Arc<S>) -> Result<HarvestReport, HarvestError>
where
    T: FromRecord,
    S: RecordSink<T> + 'static,
{
    let mut harvester = Harvester::new(config, sink)?;
    let report = intercept(&TimingInterceptor, "harvest", harvester.run()).await;
    report.log_summary();
    Ok(report)
}

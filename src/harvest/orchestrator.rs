//! Batch orchestration
//!
//! The id range is split into fixed-size batches. Each batch goes through
//! fetching, status filtering, link resolution and record construction in
//! order; its records are then handed to the [`SinkDispatcher`] and the next
//! batch starts while the previous one is still being written.

use crate::config::{CollectionConfig, Config};
use crate::harvest::dispatcher::SinkDispatcher;
use crate::harvest::fetcher::Fetcher;
use crate::harvest::report::{BatchFailure, DroppedResource, FailureStage, HarvestReport};
use crate::harvest::resolver::{resolve, LinkFieldSpec, PrimaryResource};
use crate::record::FromRecord;
use crate::storage::RecordSink;
use crate::HarvestError;
use std::ops::RangeInclusive;
use std::sync::Arc;

/// Splits `first..=last` into consecutive ranges of at most `size` ids
pub fn partition_batches(first: u32, last: u32, size: u32) -> Vec<RangeInclusive<u32>> {
    let size = size.max(1);
    let mut batches = Vec::new();
    let mut start = first;

    while start <= last {
        let end = start.saturating_add(size - 1).min(last);
        batches.push(start..=end);
        if end == u32::MAX {
            break;
        }
        start = end + 1;
    }

    batches
}

/// URL of the primary resource with the given id
pub fn primary_url(base_url: &str, id: u32) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), id)
}

/// Drives a whole harvest from the id range down to the sink
pub struct Harvester<T, S> {
    fetcher: Fetcher,
    links: LinkFieldSpec,
    collection: CollectionConfig,
    dispatcher: SinkDispatcher<T, S>,
}

impl<T, S> Harvester<T, S>
where
    T: FromRecord,
    S: RecordSink<T> + 'static,
{
    /// Builds a harvester with the fetcher, collection and links described by `config`
    pub fn new(config: &Config, sink: Arc<S>) -> Result<Self, HarvestError> {
        let fetcher = Fetcher::from_config(&config.fetcher)?;
        Ok(Self::with_fetcher(
            fetcher,
            config.collection.clone(),
            LinkFieldSpec::from_entries(&config.links),
            sink,
        ))
    }

    pub fn with_fetcher(
        fetcher: Fetcher,
        collection: CollectionConfig,
        links: LinkFieldSpec,
        sink: Arc<S>,
    ) -> Self {
        Self {
            fetcher,
            links,
            collection,
            dispatcher: SinkDispatcher::new(sink),
        }
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    /// Harvests the configured id range
    pub async fn run(&mut self) -> HarvestReport {
        let ids = self.collection.first_id..=self.collection.last_id;
        let batch_size = self.collection.batch_size;
        self.run_range(ids, batch_size).await
    }

    /// Harvests `ids` in batches of `batch_size`
    ///
    /// Returns only after every dispatched write has settled.
    pub async fn run_range(&mut self, ids: RangeInclusive<u32>, batch_size: u32) -> HarvestReport {
        let mut report = HarvestReport {
            count_dropped: self.collection.report_dropped,
            ..HarvestReport::default()
        };

        let batches = partition_batches(*ids.start(), *ids.end(), batch_size);
        tracing::info!(
            "Harvesting ids {}..={} in {} batches",
            ids.start(),
            ids.end(),
            batches.len()
        );

        for (index, batch) in batches.into_iter().enumerate() {
            report.batches += 1;
            self.run_batch(index, batch, &mut report).await;
        }

        tracing::info!(
            "Waiting for {} outstanding writes",
            self.dispatcher.outstanding()
        );
        let summary = self.dispatcher.join_all().await;
        report.records_stored = summary.records_stored;
        report
            .failures
            .extend(summary.failures.into_iter().map(|failure| BatchFailure {
                batch: failure.batch,
                stage: FailureStage::Storing,
                message: failure.error.to_string(),
            }));

        report
    }

    async fn run_batch(
        &mut self,
        index: usize,
        batch: RangeInclusive<u32>,
        report: &mut HarvestReport,
    ) {
        tracing::info!("Batch {}: fetching ids {}..={}", index, batch.start(), batch.end());

        let primaries = self.fetch_primaries(batch, report).await;
        if primaries.is_empty() {
            tracing::info!("Batch {}: no resources to resolve", index);
            return;
        }

        let resolution =
            match resolve(primaries, &self.links, &self.fetcher, &self.collection.list_delimiter)
                .await
            {
                Ok(resolution) => resolution,
                Err(e) => {
                    let stage = match e {
                        HarvestError::Record(_) => FailureStage::Building,
                        _ => FailureStage::Resolving,
                    };
                    tracing::error!("Batch {} failed while {}: {}", index, stage, e);
                    report.failures.push(BatchFailure {
                        batch: index,
                        stage,
                        message: e.to_string(),
                    });
                    return;
                }
            };
        report.links_fetched += resolution.links_fetched;

        let records = match resolution
            .records
            .iter()
            .map(T::from_record)
            .collect::<Result<Vec<_>, _>>()
        {
            Ok(records) => records,
            Err(e) => {
                tracing::error!("Batch {} failed while building records: {}", index, e);
                report.failures.push(BatchFailure {
                    batch: index,
                    stage: FailureStage::Building,
                    message: e.to_string(),
                });
                return;
            }
        };

        report.records_dispatched += records.len();
        self.dispatcher.dispatch(index, records);
    }

    /// Fetches every id of a batch concurrently and keeps the `200 OK` ones in id order
    async fn fetch_primaries(
        &self,
        batch: RangeInclusive<u32>,
        report: &mut HarvestReport,
    ) -> Vec<PrimaryResource> {
        let tasks: Vec<_> = batch
            .map(|id| {
                let fetcher = self.fetcher.clone();
                let url = primary_url(&self.collection.base_url, id);
                (id, tokio::spawn(async move { fetcher.fetch(&url).await }))
            })
            .collect();

        let mut primaries = Vec::with_capacity(tasks.len());
        for (id, task) in tasks {
            let reason = match task.await {
                Ok(Ok(result)) if result.is_ok() => {
                    report.primaries_fetched += 1;
                    primaries.push(PrimaryResource::new(id, result.body));
                    continue;
                }
                Ok(Ok(result)) => format!("HTTP {}", result.status_code),
                Ok(Err(e)) => e.to_string(),
                Err(e) => format!("fetch task failed: {}", e),
            };

            tracing::warn!("Dropping resource {}: {}", id, reason);
            report.dropped.push(DroppedResource { id, reason });
        }

        primaries
    }
}

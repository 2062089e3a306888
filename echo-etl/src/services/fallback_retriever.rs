//! Fallback retrieval across cadences
//!
//! Some sources are only ever populated quarterly; querying them monthly
//! always comes back empty. Every source is first swept at the fine cadence;
//! only sources that produced nothing are swept again at the coarse cadence.
//! Sources with fine-grained data are never re-queried coarsely, since a
//! coarse response aggregates the fine range and would double count.
//!
//! Each pass runs its calls through a bounded worker pool. Per-source row
//! counts are tallied from the returned outcomes after the whole pass has
//! drained, so the starved set is decided only once every fine call for
//! every source has finished.

use crate::error::{EtlError, EtlResult};
use crate::models::{HeaderSchema, MetricRow, OrgScope, Period, RawBatch, Source, SourceKind};
use crate::services::analytics_client::{FetchOutcome, MetricFetcher};
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Outcome of one sweep over `periods × sources`
#[derive(Debug, Default)]
pub struct PassReport {
    /// Named rows in call order (period-major, source-minor)
    pub rows: Vec<MetricRow>,
    /// Raw rows returned per source id; every queried source has an entry
    pub tally: BTreeMap<String, usize>,
    pub calls: usize,
    pub empty: usize,
    /// Failed calls, each treated as if it returned no data
    pub failures: Vec<EtlError>,
    /// Batches whose headers could not be applied
    pub schema_errors: Vec<EtlError>,
    /// The rejected batches themselves, left exactly as received
    pub unnamed_batches: Vec<RawBatch>,
}

impl PassReport {
    pub fn count_for(&self, source_id: &str) -> usize {
        self.tally.get(source_id).copied().unwrap_or(0)
    }

    /// Apply headers batch by batch; within one pass the first accepted
    /// schema per source kind wins and later batches must match it
    fn name_batches(&mut self, batches: Vec<RawBatch>) {
        let mut reference: HashMap<SourceKind, HeaderSchema> = HashMap::new();

        for batch in batches {
            let named = match reference.get(&batch.source.kind) {
                Some(schema) if !schema.is_compatible(&batch.schema) => Err(batch.mismatch(format!(
                    "headers {:?} differ from pass schema {:?}",
                    batch.schema.names(),
                    schema.names()
                ))),
                _ => batch.to_metric_rows(),
            };

            match named {
                Ok(rows) => {
                    reference
                        .entry(batch.source.kind)
                        .or_insert_with(|| batch.schema.clone());
                    self.rows.extend(rows);
                }
                Err(e) => {
                    error!(error = %e, rows = batch.row_count(), "Batch left unnamed");
                    self.schema_errors.push(e);
                    self.unnamed_batches.push(batch);
                }
            }
        }
    }
}

/// Both passes of one fallback retrieval
#[derive(Debug, Default)]
pub struct RetrievalReport {
    pub fine: PassReport,
    /// Source ids with no fine-grained rows, in input order
    pub starved: Vec<String>,
    /// Present only when `starved` was non-empty
    pub coarse: Option<PassReport>,
}

impl RetrievalReport {
    fn passes(&self) -> impl Iterator<Item = &PassReport> {
        std::iter::once(&self.fine).chain(self.coarse.iter())
    }

    pub fn row_count(&self) -> usize {
        self.passes().map(|p| p.rows.len()).sum()
    }

    pub fn failure_count(&self) -> usize {
        self.passes().map(|p| p.failures.len()).sum()
    }

    pub fn schema_error_count(&self) -> usize {
        self.passes().map(|p| p.schema_errors.len()).sum()
    }

    /// Fine rows followed by coarse rows
    pub fn into_rows(self) -> Vec<MetricRow> {
        let mut rows = self.fine.rows;
        if let Some(coarse) = self.coarse {
            rows.extend(coarse.rows);
        }
        rows
    }
}

/// Runs retrieval passes against a [`MetricFetcher`]
pub struct FallbackRetriever {
    fetcher: Arc<dyn MetricFetcher>,
    scope: OrgScope,
    concurrency: usize,
}

impl FallbackRetriever {
    /// `concurrency` is the worker-pool bound per pass (minimum 1)
    pub fn new(fetcher: Arc<dyn MetricFetcher>, scope: OrgScope, concurrency: usize) -> Self {
        Self {
            fetcher,
            scope,
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Fine sweep over all sources, then a coarse sweep over the starved ones
    pub async fn retrieve_with_fallback(
        &self,
        fine: &[Period],
        coarse: &[Period],
        sources: &[Source],
    ) -> RetrievalReport {
        let fine_pass = self.collect_pass(fine, sources, "fine").await;

        let starved: Vec<Source> = sources
            .iter()
            .filter(|s| fine_pass.count_for(&s.id) == 0)
            .cloned()
            .collect();

        let coarse_pass = if starved.is_empty() {
            None
        } else {
            info!(
                starved = starved.len(),
                sources = ?starved.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(),
                "Retrying sources with no fine-grained rows at coarse cadence"
            );
            Some(self.collect_pass(coarse, &starved, "coarse").await)
        };

        RetrievalReport {
            fine: fine_pass,
            starved: starved.into_iter().map(|s| s.id).collect(),
            coarse: coarse_pass,
        }
    }

    /// One sweep over `periods × sources`, no fallback
    pub async fn collect_pass(&self, periods: &[Period], sources: &[Source], label: &str) -> PassReport {
        let started = Instant::now();
        let pairs: Vec<(usize, &Period, &Source)> = periods
            .iter()
            .flat_map(|period| sources.iter().map(move |source| (period, source)))
            .enumerate()
            .map(|(index, (period, source))| (index, period, source))
            .collect();

        let mut report = PassReport {
            calls: pairs.len(),
            tally: sources.iter().map(|s| (s.id.clone(), 0)).collect(),
            ..Default::default()
        };

        info!(
            pass = label,
            periods = periods.len(),
            sources = sources.len(),
            calls = report.calls,
            workers = self.concurrency,
            "Starting retrieval pass"
        );

        let mut results: Vec<(usize, EtlResult<FetchOutcome>)> = stream::iter(pairs)
            .map(|(index, period, source)| async move {
                tracing::debug!(pass = label, period = %period, source = %source.id, "Fetching");
                (index, self.fetcher.fetch(period, source, &self.scope).await)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        // Completion order is arbitrary; restore call order
        results.sort_by_key(|(index, _)| *index);

        let mut batches = Vec::new();
        for (_, outcome) in results {
            match outcome {
                Ok(FetchOutcome::Data(batch)) => {
                    *report.tally.entry(batch.source.id.clone()).or_insert(0) += batch.row_count();
                    batches.push(batch);
                }
                Ok(FetchOutcome::Empty) => report.empty += 1,
                Err(e) => {
                    warn!(pass = label, error = %e, "Fetch failed; treating as no data");
                    report.failures.push(e);
                }
            }
        }

        report.name_batches(batches);

        info!(
            pass = label,
            rows = report.rows.len(),
            empty = report.empty,
            failures = report.failures.len(),
            schema_errors = report.schema_errors.len(),
            elapsed = ?started.elapsed(),
            "Retrieval pass completed"
        );

        report
    }
}

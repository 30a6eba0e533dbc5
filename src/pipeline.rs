//! Fetch-aggregate-merge pipeline.
//!
//! Descriptors are fetched concurrently; responses are aggregated and merged
//! into the report store by the single task that drains the fetch stream, so
//! merges never race. A failed descriptor is logged and skipped.

use crate::analysis::parse_rows;
use crate::fetch::{FetchError, Fetcher};
use crate::models::{AggregateResult, FetchDescriptor};
use crate::report::ReportStore;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Pipeline settings.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Maximum number of requests in flight.
    pub concurrency: usize,
    pub show_progress: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            concurrency: 8,
            show_progress: false,
        }
    }
}

/// Outcome counts of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub planned: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

/// Drives descriptors through fetch, aggregation and merge.
pub struct Pipeline<F> {
    fetcher: F,
    options: PipelineOptions,
}

impl<F: Fetcher> Pipeline<F> {
    pub fn new(fetcher: F, options: PipelineOptions) -> Self {
        Self { fetcher, options }
    }

    /// Fetch every descriptor and merge the results into `store`.
    pub async fn run(&self, descriptors: &[FetchDescriptor], store: &mut ReportStore) -> RunSummary {
        let start = Instant::now();
        let progress = self.progress_bar(descriptors.len());
        let fetcher = &self.fetcher;

        info!(
            "Fetching {} endpoints with concurrency {}",
            descriptors.len(),
            self.options.concurrency
        );

        let mut responses = stream::iter(descriptors)
            .map(|descriptor| async move { (descriptor, fetcher.fetch(descriptor).await) })
            .buffer_unordered(self.options.concurrency.max(1));

        let mut succeeded = 0;
        let mut failed = 0;

        while let Some((descriptor, outcome)) = responses.next().await {
            match outcome.and_then(|body| aggregate(descriptor, body)) {
                Ok(result) => {
                    debug!("{} -> {} metrics", descriptor, result.len());
                    store.merge(&descriptor.app_id, descriptor.country.as_deref(), result);
                    succeeded += 1;
                }
                Err(e) => {
                    error!("Skipping {}: {}", descriptor, e);
                    failed += 1;
                }
            }
            progress.inc(1);
        }

        progress.finish_and_clear();

        let summary = RunSummary {
            planned: descriptors.len(),
            succeeded,
            failed,
            elapsed: start.elapsed(),
        };
        info!(
            "Harvest finished: {} succeeded, {} failed",
            summary.succeeded, summary.failed
        );
        summary
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.options.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(len as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb
    }
}

/// Reduce one response body with the descriptor's aggregator.
fn aggregate(descriptor: &FetchDescriptor, body: Value) -> Result<AggregateResult, FetchError> {
    let rows = parse_rows(descriptor.endpoint, body)?;
    let mut result = (descriptor.endpoint.aggregator())(&rows);
    result.insert("appId".to_string(), json!(descriptor.app_id));
    Ok(result)
}

//! Export coordinator for orchestrating export operations
//!
//! This module provides the pipeline that brings together PIT streaming
//! queries, progress tracking and format writing. Partitions run strictly
//! one after another, each with its own point-in-time.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{RetryPolicy, SearchClient};
use crate::error::{ElasticError, Result};

use super::partition::TimePartition;
use super::progress::ProgressTracker;
use super::streaming::{PitStreamingQuery, StreamingQuery};
use super::writers::FormatWriter;

/// What to export.
#[derive(Debug, Clone)]
pub struct ExportPlan {
    /// Index, alias or pattern
    pub index: String,
    /// Prepared query body (see [`crate::query::prepare_export_query`])
    pub body: Value,
    /// Processed in order
    pub partitions: Vec<TimePartition>,
    pub page_size: usize,
    pub keep_alive: Duration,
    pub timestamp_field: String,
}

/// Per-partition statistics
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionReport {
    pub label: String,
    pub documents: u64,
    pub pages: u64,
    pub elapsed: Duration,
}

/// Result of an export operation
#[derive(Debug, Clone, PartialEq)]
pub struct ExportReport {
    pub partitions: Vec<PartitionReport>,
    pub total_documents: u64,
    pub bytes_written: u64,
    pub elapsed: Duration,
}

/// Full-corpus export over PIT deep pagination.
pub struct ExportPipeline {
    client: Arc<dyn SearchClient>,
    retry: RetryPolicy,
    /// Progress tracker for user feedback
    tracker: ProgressTracker,
    /// Cancellation token for aborting export
    cancel_token: Option<CancellationToken>,
}

impl ExportPipeline {
    pub fn new(client: Arc<dyn SearchClient>, retry: RetryPolicy) -> Self {
        Self {
            client,
            retry,
            tracker: ProgressTracker::hidden(),
            cancel_token: None,
        }
    }

    pub fn with_progress(mut self, tracker: ProgressTracker) -> Self {
        self.tracker = tracker;
        self
    }

    /// Set cancellation token for this export operation
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /// Execute the export
    ///
    /// Every page is written and flushed before the next one is requested,
    /// so on failure the sink holds a complete prefix of the result. A
    /// failed partition aborts the ones after it. The sink is finalized in
    /// every case.
    ///
    /// # Arguments
    /// * `plan` - Index, query and partitions
    /// * `sink` - Output writer
    ///
    /// # Returns
    /// * `Result<ExportReport>` - Export statistics or the first error,
    ///   labelled with its partition when the export is time-bounded
    pub async fn run(&self, plan: &ExportPlan, sink: &mut dyn FormatWriter) -> Result<ExportReport> {
        let started = Instant::now();
        info!(
            "Starting export of {} ({} partitions)",
            plan.index,
            plan.partitions.len()
        );

        let mut reports = Vec::with_capacity(plan.partitions.len());
        let mut total = 0u64;

        for partition in &plan.partitions {
            let label = partition.to_string();
            self.tracker.set_partition(&label);

            match self.run_partition(plan, partition, &label, total, sink).await {
                Ok(report) => {
                    total += report.documents;
                    reports.push(report);
                }
                Err(err) => {
                    if let Err(finalize_err) = sink.finalize().await {
                        warn!(error = %finalize_err, "failed to finalize output after export error");
                    }
                    self.tracker.finish();
                    return Err(if partition.is_bounded() {
                        err.in_partition(label)
                    } else {
                        err
                    });
                }
            }
        }

        sink.finalize().await?;
        self.tracker.finish();

        let elapsed = started.elapsed();
        info!(
            "Export completed: {} documents, {} bytes, {} ms",
            total,
            sink.bytes_written(),
            elapsed.as_millis()
        );

        Ok(ExportReport {
            partitions: reports,
            total_documents: total,
            bytes_written: sink.bytes_written(),
            elapsed,
        })
    }

    async fn run_partition(
        &self,
        plan: &ExportPlan,
        partition: &TimePartition,
        label: &str,
        exported_before: u64,
        sink: &mut dyn FormatWriter,
    ) -> Result<PartitionReport> {
        let started = Instant::now();
        info!("Exporting partition {}", label);
        self.check_cancelled()?;

        let body = partition.apply(&plan.body, &plan.timestamp_field);
        let mut query = PitStreamingQuery::open(
            self.client.clone(),
            self.retry,
            &plan.index,
            body,
            plan.page_size,
            plan.keep_alive,
        )
        .await?;

        let outcome = self.drain(&mut query, sink, exported_before).await;
        query.close().await?;
        let (documents, pages) = outcome?;

        let elapsed = started.elapsed();
        info!(
            "Partition {} done: {} documents in {} pages, {} ms",
            label,
            documents,
            pages,
            elapsed.as_millis()
        );
        Ok(PartitionReport {
            label: label.to_string(),
            documents,
            pages,
            elapsed,
        })
    }

    /// Copy pages from `query` to `sink` until exhausted.
    async fn drain(
        &self,
        query: &mut dyn StreamingQuery,
        sink: &mut dyn FormatWriter,
        exported_before: u64,
    ) -> Result<(u64, u64)> {
        let mut documents = 0u64;
        let mut pages = 0u64;

        loop {
            self.check_cancelled()?;

            let Some(docs) = query.next_batch().await? else {
                debug!("No more documents available");
                break;
            };

            sink.write_batch(&docs).await?;
            sink.flush().await?;

            documents += docs.len() as u64;
            pages += 1;
            self.tracker.update(exported_before + documents);

            if pages % 10 == 0 {
                info!("Progress: {} documents exported ({} pages)", documents, pages);
            }
        }

        Ok((documents, pages))
    }

    fn check_cancelled(&self) -> Result<()> {
        match &self.cancel_token {
            Some(token) if token.is_cancelled() => {
                info!("Export operation cancelled by user");
                Err(ElasticError::Cancelled)
            }
            _ => Ok(()),
        }
    }
}

//! Async search lifecycle: submit, status, wait, get, delete
//!
//! The controller owns no state of its own; every handle it returns is a
//! snapshot of what the server reported on the last call.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::client::{AsyncSearchResponse, RetryPolicy, SearchClient, ShardStats};
use crate::error::{ElasticError, Result};

use super::export::FormatWriter;

/// Lifecycle state derived from the running/partial flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    Running,
    /// Stopped with incomplete results (shard failures or timeouts).
    PartialTimeout,
    /// Final; further fetches return the same results.
    Complete,
}

impl SearchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchState::Running => "RUNNING",
            SearchState::PartialTimeout => "PARTIAL",
            SearchState::Complete => "COMPLETE",
        }
    }
}

/// Snapshot of one server-side async search job.
#[derive(Debug, Clone, PartialEq)]
pub struct AsyncSearchHandle {
    pub id: String,
    pub keep_alive: Option<Duration>,
    pub is_running: bool,
    pub is_partial: bool,
    pub shards: ShardStats,
    pub took_ms: u64,
    /// Hits included in this response.
    pub hits_returned: usize,
    /// Matches counted by the server so far.
    pub total_hits: Option<u64>,
    pub expiration_ms: Option<u64>,
}

impl AsyncSearchHandle {
    fn from_response(
        operation: &'static str,
        response: &AsyncSearchResponse,
        keep_alive: Option<Duration>,
    ) -> Result<Self> {
        let id = response.id.clone().ok_or_else(|| {
            ElasticError::deserialization(operation, "response has no async search id")
        })?;
        Ok(Self {
            id,
            keep_alive,
            is_running: response.is_running,
            is_partial: response.is_partial,
            shards: response.response.shards,
            took_ms: response.response.took,
            hits_returned: response.hits().len(),
            total_hits: response.response.hits.total.as_ref().map(|t| t.value()),
            expiration_ms: response.expiration_time_in_millis,
        })
    }

    pub fn state(&self) -> SearchState {
        match (self.is_running, self.is_partial) {
            (true, _) => SearchState::Running,
            (false, true) => SearchState::PartialTimeout,
            (false, false) => SearchState::Complete,
        }
    }
}

/// Client-side polling parameters for [`AsyncSearchController::wait`].
#[derive(Debug, Clone, Default)]
pub struct WaitOptions {
    pub interval: Duration,
    /// `None` waits indefinitely.
    pub timeout: Option<Duration>,
    pub cancel: Option<CancellationToken>,
}

/// Result of [`AsyncSearchController::delete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// Unknown, expired or already deleted.
    AlreadyGone,
}

/// Hits written by [`AsyncSearchController::get`].
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResult {
    pub handle: AsyncSearchHandle,
    pub documents: usize,
}

pub struct AsyncSearchController {
    client: Arc<dyn SearchClient>,
    retry: RetryPolicy,
}

impl AsyncSearchController {
    pub fn new(client: Arc<dyn SearchClient>, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    /// Submit a query.
    ///
    /// # Arguments
    /// * `index` - Index, alias or pattern
    /// * `query` - Search body
    /// * `keep_alive` - Retention of the job and its results
    /// * `wait_for` - Server-side wait for early completion
    ///
    /// # Returns
    /// * `Result<AsyncSearchHandle>` - Possibly still running
    pub async fn submit(
        &self,
        index: &str,
        query: &Value,
        keep_alive: Duration,
        wait_for: Option<Duration>,
    ) -> Result<AsyncSearchHandle> {
        let client = &self.client;
        let response = self
            .retry
            .run("submit_async_search", move || {
                client.submit_async_search(index, query, keep_alive, wait_for)
            })
            .await?;

        let handle =
            AsyncSearchHandle::from_response("submit_async_search", &response, Some(keep_alive))?;
        info!(
            "Submitted async search {} on {} ({})",
            handle.id,
            index,
            handle.state().as_str()
        );
        Ok(handle)
    }

    /// Refresh a job's state, optionally blocking server-side.
    pub async fn status(&self, search_id: &str, wait_for: Option<Duration>) -> Result<AsyncSearchHandle> {
        let response = self.fetch(search_id, wait_for).await?;
        AsyncSearchHandle::from_response("get_async_search", &response, None)
    }

    async fn fetch(&self, search_id: &str, wait_for: Option<Duration>) -> Result<AsyncSearchResponse> {
        let client = &self.client;
        self.retry
            .run("get_async_search", move || {
                client.get_async_search(search_id, wait_for)
            })
            .await
    }

    /// Poll until the job stops running.
    ///
    /// Each poll is a status call without server-side wait; `on_poll` sees
    /// every snapshot with the time waited so far. On timeout the job is
    /// left in place.
    ///
    /// # Arguments
    /// * `search_id` - Job id
    /// * `options` - Poll interval, timeout and cancellation
    /// * `on_poll` - Observer called after each poll
    ///
    /// # Returns
    /// * `Result<AsyncSearchHandle>` - First non-running snapshot
    pub async fn wait(
        &self,
        search_id: &str,
        options: &WaitOptions,
        on_poll: &mut (dyn FnMut(&AsyncSearchHandle, Duration) + Send),
    ) -> Result<AsyncSearchHandle> {
        let started = Instant::now();
        let mut polls = 0u64;

        loop {
            let handle = self.status(search_id, None).await?;
            polls += 1;
            let waited = started.elapsed();
            on_poll(&handle, waited);

            if !handle.is_running {
                debug!("Async search {} finished after {} polls", search_id, polls);
                return Ok(handle);
            }

            let delay = match options.timeout {
                Some(timeout) if waited >= timeout => {
                    return Err(ElasticError::Timeout {
                        search_id: search_id.to_string(),
                        waited,
                    });
                }
                Some(timeout) => options.interval.min(timeout - waited),
                None => options.interval,
            };
            debug!(
                "Async search {} still running ({}/{} shards), next poll in {} ms",
                search_id,
                handle.shards.successful,
                handle.shards.total,
                delay.as_millis()
            );
            pause(delay, options.cancel.as_ref()).await?;
        }
    }

    /// Write the job's current hits to `sink` and finalize it.
    ///
    /// A running job yields its partial result set.
    pub async fn get(&self, search_id: &str, sink: &mut dyn FormatWriter) -> Result<FetchResult> {
        let response = self.fetch(search_id, None).await?;
        let handle = AsyncSearchHandle::from_response("get_async_search", &response, None)?;
        if handle.is_running {
            info!("Async search {} is still running; results are partial", search_id);
        }

        let hits = response.into_hits();
        let documents = sink.write_batch(&hits).await?;
        sink.finalize().await?;

        Ok(FetchResult { handle, documents })
    }

    /// Delete a job. Deleting an unknown id is not an error.
    pub async fn delete(&self, search_id: &str) -> Result<DeleteOutcome> {
        let client = &self.client;
        let existed = self
            .retry
            .run("delete_async_search", move || {
                client.delete_async_search(search_id)
            })
            .await?;

        Ok(if existed {
            info!("Deleted async search {}", search_id);
            DeleteOutcome::Deleted
        } else {
            debug!("Async search {} was already gone", search_id);
            DeleteOutcome::AlreadyGone
        })
    }
}

/// Sleep `delay`, returning early with [`ElasticError::Cancelled`].
async fn pause(delay: Duration, cancel: Option<&CancellationToken>) -> Result<()> {
    match cancel {
        Some(token) => tokio::select! {
            _ = tokio::time::sleep(delay) => Ok(()),
            _ = token.cancelled() => Err(ElasticError::Cancelled),
        },
        None => {
            tokio::time::sleep(delay).await;
            Ok(())
        }
    }
}

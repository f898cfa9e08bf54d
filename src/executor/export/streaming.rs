//! Streaming query abstractions for export operations
//!
//! This module provides a batch interface over PIT-backed deep pagination,
//! so the coordinator never holds more than one page of hits.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::client::{RetryPolicy, SearchClient};
use crate::error::{ElasticError, Result};

use super::cursor::{ExportCursor, SortOrder};

/// Trait for streaming query results in batches
#[async_trait]
pub trait StreamingQuery: Send {
    /// Fetch the next batch of hits
    ///
    /// # Returns
    /// * `Result<Option<Vec<Value>>>` - Next batch of hits, or None if exhausted
    async fn next_batch(&mut self) -> Result<Option<Vec<Value>>>;

    /// Close the query and release server resources
    async fn close(&mut self) -> Result<()>;
}

/// One partition's PIT session.
pub struct PitStreamingQuery {
    client: Arc<dyn SearchClient>,
    retry: RetryPolicy,
    body: Value,
    order: SortOrder,
    keep_alive: Duration,
    cursor: ExportCursor,
    exhausted: bool,
    closed: bool,
}

impl PitStreamingQuery {
    /// Open a point-in-time over `index` and position a cursor before the
    /// first hit.
    ///
    /// # Arguments
    /// * `client` - Search client
    /// * `retry` - Policy for transient failures
    /// * `index` - Index, alias or pattern
    /// * `body` - Prepared query body; its `sort` must end in a tie-break
    /// * `page_size` - Hits per page
    /// * `keep_alive` - PIT lease, renewed on every page
    ///
    /// # Returns
    /// * `Result<Self>` - Open session or error
    pub async fn open(
        client: Arc<dyn SearchClient>,
        retry: RetryPolicy,
        index: &str,
        body: Value,
        page_size: usize,
        keep_alive: Duration,
    ) -> Result<Self> {
        let pit_id = {
            let client = &client;
            retry
                .run("open_point_in_time", move || {
                    client.open_point_in_time(index, keep_alive)
                })
                .await?
        };
        debug!("Opened point-in-time over {}", index);

        Ok(Self {
            order: SortOrder::from_query(&body),
            client,
            retry,
            body,
            keep_alive,
            cursor: ExportCursor::new(pit_id, page_size),
            exhausted: false,
            closed: false,
        })
    }

    pub fn cursor(&self) -> &ExportCursor {
        &self.cursor
    }
}

#[async_trait]
impl StreamingQuery for PitStreamingQuery {
    async fn next_batch(&mut self) -> Result<Option<Vec<Value>>> {
        if self.exhausted || self.closed {
            return Ok(None);
        }

        let request = self.cursor.next_request(&self.body, self.keep_alive);
        let response = {
            let client = &self.client;
            let request = &request;
            self.retry
                .run("search_with_pit", move || client.search_with_pit(request))
                .await
        };
        let response = response.map_err(|err| match err {
            ElasticError::NotFound { id, .. } => ElasticError::Consistency {
                reason: format!("point-in-time {id} expired; the partition must be restarted"),
            },
            other => other,
        })?;

        // Hits from a page missing shards would let search_after skip
        // the documents those shards hold.
        let shards = &response.shards;
        if shards.failed > 0 || response.timed_out {
            return Err(ElasticError::Consistency {
                reason: format!(
                    "page {} incomplete: {} of {} shards failed{}",
                    self.cursor.pages + 1,
                    shards.failed,
                    shards.total,
                    if response.timed_out { ", search timed out" } else { "" }
                ),
            });
        }

        let hits = response.hits.hits;
        let last_key = self.cursor.check_page(&self.order, &hits)?;
        let count = hits.len();
        self.cursor.advance(response.pit_id, last_key, count);
        debug!(
            page = self.cursor.pages,
            hits = count,
            took_ms = response.took,
            "fetched page"
        );

        if self.cursor.is_last_page(count) {
            self.exhausted = true;
        }
        if count == 0 {
            return Ok(None);
        }
        Ok(Some(hits))
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        // The lease expires on its own; a failed close only costs server memory.
        match self.client.close_point_in_time(&self.cursor.pit_id).await {
            Ok(()) => info!(
                "Closed point-in-time after {} documents in {} pages",
                self.cursor.documents_emitted, self.cursor.pages
            ),
            Err(err) => warn!(error = %err, "failed to close point-in-time; it will expire"),
        }
        Ok(())
    }
}

impl Drop for PitStreamingQuery {
    fn drop(&mut self) {
        if !self.closed {
            debug!("PitStreamingQuery dropped without explicit close");
        }
    }
}

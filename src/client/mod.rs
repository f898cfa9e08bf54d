//! Search-service client for Elasticsearch
//!
//! This module defines the [`SearchClient`] capability: the six operations
//! the async-search controller and the export pipeline need from a cluster.
//! - [`HttpSearchClient`]: reqwest implementation against the REST API
//! - [`RetryPolicy`]: shared exponential backoff for transient failures
//! - [`models`]: response shapes
//!
//! The client is constructed explicitly and passed in as
//! `Arc<dyn SearchClient>`, so both components can run against a
//! substitute implementation in tests.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::Result;
use crate::utils::time::to_es_time;

#[cfg(test)]
pub(crate) mod fake;
pub mod http;
pub mod models;
pub mod retry;

pub use http::HttpSearchClient;
pub use models::{AsyncSearchResponse, PitSearchResponse, SearchBody, ShardStats};
pub use retry::RetryPolicy;

/// The six cluster operations used by this crate.
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Submit a query as an async search job.
    ///
    /// With `wait_for`, the server blocks up to that long hoping for early
    /// completion before answering.
    async fn submit_async_search(
        &self,
        index: &str,
        query: &Value,
        keep_alive: Duration,
        wait_for: Option<Duration>,
    ) -> Result<AsyncSearchResponse>;

    /// Fetch the current state (and accumulated hits) of a job.
    async fn get_async_search(
        &self,
        search_id: &str,
        wait_for: Option<Duration>,
    ) -> Result<AsyncSearchResponse>;

    /// Delete a job. Returns `false` when the id was already unknown.
    async fn delete_async_search(&self, search_id: &str) -> Result<bool>;

    /// Open a point-in-time over `index` and return its id.
    async fn open_point_in_time(&self, index: &str, keep_alive: Duration) -> Result<String>;

    /// Run one page of a PIT-backed search.
    async fn search_with_pit(&self, request: &PitSearchRequest) -> Result<PitSearchResponse>;

    /// Close a point-in-time. Unknown ids are not an error.
    async fn close_point_in_time(&self, pit_id: &str) -> Result<()>;
}

/// One page request against a point-in-time.
#[derive(Debug, Clone, PartialEq)]
pub struct PitSearchRequest {
    /// Query body including `sort`; `pit`, `size` and `search_after` are
    /// filled in by [`PitSearchRequest::to_body`].
    pub body: Value,
    pub pit_id: String,
    pub keep_alive: Duration,
    pub size: usize,
    pub search_after: Option<Vec<Value>>,
}

impl PitSearchRequest {
    /// Build the JSON sent to `POST /_search`.
    pub fn to_body(&self) -> Value {
        let mut body = match &self.body {
            Value::Object(map) => map.clone(),
            _ => serde_json::Map::new(),
        };

        // Offsets are meaningless with search_after.
        body.remove("from");
        body.insert(
            "pit".to_string(),
            json!({ "id": self.pit_id, "keep_alive": to_es_time(self.keep_alive) }),
        );
        body.insert("size".to_string(), json!(self.size));
        match &self.search_after {
            Some(values) => {
                body.insert("search_after".to_string(), Value::Array(values.clone()));
            }
            None => {
                body.remove("search_after");
            }
        }
        Value::Object(body)
    }
}

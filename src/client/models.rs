//! Response models for the Elasticsearch endpoints used by this crate.
//!
//! Hits are kept as raw JSON values: they are written to the sink exactly
//! as the server returned them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Shard statistics from search responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardStats {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub successful: u64,
    #[serde(default)]
    pub skipped: u64,
    #[serde(default)]
    pub failed: u64,
}

/// `hits.total`, either a bare count or `{value, relation}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HitsTotal {
    Count(u64),
    Detailed { value: u64, relation: String },
}

impl HitsTotal {
    pub fn value(&self) -> u64 {
        match self {
            HitsTotal::Count(n) => *n,
            HitsTotal::Detailed { value, .. } => *value,
        }
    }
}

/// Container for search hits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HitsContainer {
    #[serde(default)]
    pub hits: Vec<Value>,
    #[serde(default)]
    pub total: Option<HitsTotal>,
}

/// Search response body, as embedded in async search responses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchBody {
    #[serde(default)]
    pub took: u64,
    #[serde(default)]
    pub timed_out: bool,
    #[serde(rename = "_shards", default)]
    pub shards: ShardStats,
    #[serde(default)]
    pub hits: HitsContainer,
}

/// Response from the async search submit/get APIs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AsyncSearchResponse {
    /// Absent when the search finished within `wait_for` and was not kept.
    #[serde(default)]
    pub id: Option<String>,
    pub is_running: bool,
    pub is_partial: bool,
    #[serde(default)]
    pub start_time_in_millis: Option<u64>,
    #[serde(default)]
    pub expiration_time_in_millis: Option<u64>,
    #[serde(default)]
    pub response: SearchBody,
}

impl AsyncSearchResponse {
    /// Hits accumulated so far.
    pub fn hits(&self) -> &[Value] {
        &self.response.hits.hits
    }

    pub fn into_hits(self) -> Vec<Value> {
        self.response.hits.hits
    }
}

/// Response from `POST /{index}/_pit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PitOpenResponse {
    pub id: String,
}

/// Response from a PIT-backed `POST /_search`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PitSearchResponse {
    /// Superseding PIT id; must be used for the next page.
    #[serde(default)]
    pub pit_id: Option<String>,
    #[serde(default)]
    pub took: u64,
    #[serde(default)]
    pub timed_out: bool,
    #[serde(rename = "_shards", default)]
    pub shards: ShardStats,
    pub hits: HitsContainer,
}

//! Scripted in-memory [`SearchClient`] used by controller and pipeline tests.
//!
//! The corpus is kept sorted by `id`, documents without one first; every hit
//! carries `sort: [id, ordinal]` where the ordinal stands in for `_shard_doc`. Each page issues a new PIT
//! id and rejects the superseded one, like a real cluster would once the
//! old id has been replaced.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::{ElasticError, Result};

use super::models::{AsyncSearchResponse, HitsContainer, PitSearchResponse, SearchBody, ShardStats};
use super::{PitSearchRequest, SearchClient};

/// Index name the fake treats as nonexistent.
pub(crate) const MISSING_INDEX: &str = "missing-index";

/// Failure injected into a given `search_with_pit` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Failure {
    /// Connection reset (retryable).
    Transport,
    /// PIT id unknown to the server.
    PitExpired,
    /// Page whose hits repeat the previous sort key.
    StalePage,
    /// Hits without a `sort` array.
    MissingSort,
    /// Response did not decode.
    Malformed,
    /// Page answered by only half the shards, after a timeout.
    ShardFailure,
}

#[derive(Debug)]
struct FakeJob {
    polls_until_done: usize,
    hits: Vec<Value>,
}

#[derive(Debug, Default)]
struct FakeState {
    corpus: Vec<Value>,
    calls: Vec<String>,
    page_sizes: Vec<usize>,
    live_pits: HashSet<String>,
    pit_counter: usize,
    search_calls: usize,
    failures: HashMap<usize, VecDeque<Failure>>,
    jobs: HashMap<String, FakeJob>,
    job_counter: usize,
    job_running_polls: usize,
    fail_close: bool,
}

#[derive(Debug, Default)]
pub(crate) struct FakeSearchClient {
    state: Mutex<FakeState>,
}

/// Build a corpus document.
pub(crate) fn doc(id: u64, timestamp: &str) -> Value {
    json!({ "id": id, "@timestamp": timestamp })
}

/// Ids of the written hits, in order.
pub(crate) fn hit_ids(hits: &[Value]) -> Vec<u64> {
    hits.iter()
        .filter_map(|h| h["_source"]["id"].as_u64())
        .collect()
}

impl FakeSearchClient {
    pub(crate) fn with_docs(docs: Vec<Value>) -> Self {
        let mut docs = docs;
        docs.sort_by_key(|d| d["id"].as_u64().unwrap_or_default());
        Self {
            state: Mutex::new(FakeState {
                corpus: docs,
                ..FakeState::default()
            }),
        }
    }

    /// `count` documents with ids `1..=count` on consecutive days of January 2025.
    pub(crate) fn with_sequence(count: u64) -> Self {
        Self::with_docs(
            (1..=count)
                .map(|id| doc(id, &format!("2025-01-{:02}T00:00:00Z", (id - 1) % 31 + 1)))
                .collect(),
        )
    }

    /// Async jobs stay running for `polls` status calls after submission.
    pub(crate) fn job_running_for(self, polls: usize) -> Self {
        self.state.lock().unwrap().job_running_polls = polls;
        self
    }

    /// Inject a failure on the `call`-th (1-based) `search_with_pit` call.
    pub(crate) fn fail_search(self, call: usize, failure: Failure) -> Self {
        self.state
            .lock()
            .unwrap()
            .failures
            .entry(call)
            .or_default()
            .push_back(failure);
        self
    }

    pub(crate) fn fail_close(self) -> Self {
        self.state.lock().unwrap().fail_close = true;
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub(crate) fn count_calls(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    /// Hit counts of successful pages, in order.
    pub(crate) fn page_sizes(&self) -> Vec<usize> {
        self.state.lock().unwrap().page_sizes.clone()
    }

    pub(crate) fn live_pits(&self) -> usize {
        self.state.lock().unwrap().live_pits.len()
    }

    pub(crate) fn has_job(&self, id: &str) -> bool {
        self.state.lock().unwrap().jobs.contains_key(id)
    }
}

impl FakeState {
    fn record(&mut self, call: impl Into<String>) {
        self.calls.push(call.into());
    }

    fn hits_for(&self, query: &Value) -> Vec<Value> {
        let (gte, lt) = range_bounds(query);
        self.corpus
            .iter()
            .enumerate()
            .filter(|(_, d)| {
                let ts = d["@timestamp"].as_str().unwrap_or_default();
                gte.as_deref().is_none_or(|g| ts >= g) && lt.as_deref().is_none_or(|l| ts < l)
            })
            .map(|(ordinal, d)| {
                // Documents without an id carry a null sort value and sort first.
                let id = d["id"].clone();
                let doc_id = id.as_u64().map_or_else(|| format!("doc-{ordinal}"), |id| id.to_string());
                json!({
                    "_index": "logs",
                    "_id": doc_id,
                    "_source": d,
                    "sort": [id, ordinal as u64],
                })
            })
            .collect()
    }

    fn next_pit(&mut self) -> String {
        self.pit_counter += 1;
        let id = format!("pit-{}", self.pit_counter);
        self.live_pits.insert(id.clone());
        id
    }
}

/// `gte`/`lt` of a `range` on `@timestamp` inside `bool.filter`.
fn range_bounds(query: &Value) -> (Option<String>, Option<String>) {
    let filters = query["query"]["bool"]["filter"].as_array().cloned().unwrap_or_default();
    for filter in filters {
        let range = &filter["range"]["@timestamp"];
        if range.is_object() {
            return (
                range["gte"].as_str().map(str::to_string),
                range["lt"].as_str().map(str::to_string),
            );
        }
    }
    (None, None)
}

fn sort_key(hit: &Value) -> (u64, u64) {
    let sort = &hit["sort"];
    (
        sort[0].as_u64().unwrap_or_default(),
        sort[1].as_u64().unwrap_or_default(),
    )
}

fn after_key(search_after: &[Value]) -> (u64, u64) {
    (
        search_after.first().and_then(Value::as_u64).unwrap_or_default(),
        search_after.get(1).and_then(Value::as_u64).unwrap_or_default(),
    )
}

fn job_response(id: &str, running: bool, hits: &[Value]) -> AsyncSearchResponse {
    // A running job exposes only the first half of its result set.
    let visible = if running { &hits[..hits.len() / 2] } else { hits };
    AsyncSearchResponse {
        id: Some(id.to_string()),
        is_running: running,
        is_partial: running,
        start_time_in_millis: Some(1_736_000_000_000),
        expiration_time_in_millis: Some(1_736_003_600_000),
        response: SearchBody {
            took: 7,
            timed_out: false,
            shards: ShardStats {
                total: 4,
                successful: if running { 2 } else { 4 },
                skipped: 0,
                failed: 0,
            },
            hits: HitsContainer {
                hits: visible.to_vec(),
                total: None,
            },
        },
    }
}

#[async_trait]
impl SearchClient for FakeSearchClient {
    async fn submit_async_search(
        &self,
        index: &str,
        query: &Value,
        _keep_alive: Duration,
        wait_for: Option<Duration>,
    ) -> Result<AsyncSearchResponse> {
        let mut state = self.state.lock().unwrap();
        state.record(format!("submit:{index}"));
        if index == MISSING_INDEX {
            return Err(ElasticError::InvalidIndex {
                index: index.to_string(),
                message: "index_not_found_exception: no such index".into(),
            });
        }

        state.job_counter += 1;
        let id = format!("job-{}", state.job_counter);
        let hits = state.hits_for(query);
        let polls = state.job_running_polls;
        let running = polls > 0 || wait_for.is_none();
        let response = job_response(&id, running, &hits);
        state.jobs.insert(
            id,
            FakeJob {
                polls_until_done: polls,
                hits,
            },
        );
        Ok(response)
    }

    async fn get_async_search(
        &self,
        search_id: &str,
        _wait_for: Option<Duration>,
    ) -> Result<AsyncSearchResponse> {
        let mut state = self.state.lock().unwrap();
        state.record(format!("get:{search_id}"));
        let job = state
            .jobs
            .get_mut(search_id)
            .ok_or_else(|| ElasticError::NotFound {
                operation: "get_async_search",
                id: search_id.to_string(),
            })?;

        let running = job.polls_until_done > 0;
        job.polls_until_done = job.polls_until_done.saturating_sub(1);
        Ok(job_response(search_id, running, &job.hits))
    }

    async fn delete_async_search(&self, search_id: &str) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        state.record(format!("delete:{search_id}"));
        Ok(state.jobs.remove(search_id).is_some())
    }

    async fn open_point_in_time(&self, index: &str, _keep_alive: Duration) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.record(format!("open_pit:{index}"));
        if index == MISSING_INDEX {
            return Err(ElasticError::InvalidIndex {
                index: index.to_string(),
                message: "index_not_found_exception: no such index".into(),
            });
        }
        Ok(state.next_pit())
    }

    async fn search_with_pit(&self, request: &PitSearchRequest) -> Result<PitSearchResponse> {
        let mut state = self.state.lock().unwrap();
        state.search_calls += 1;
        let call = state.search_calls;
        state.record(format!("search:{}", request.pit_id));

        let injected = state.failures.get_mut(&call).and_then(VecDeque::pop_front);
        match injected {
            Some(Failure::Transport) => {
                return Err(ElasticError::Transport {
                    operation: "search_with_pit",
                    message: "connection reset by peer".into(),
                });
            }
            Some(Failure::PitExpired) => {
                state.live_pits.remove(&request.pit_id);
            }
            Some(Failure::Malformed) => {
                return Err(ElasticError::Deserialization {
                    operation: "search_with_pit",
                    message: "invalid type: string, expected struct HitsContainer".into(),
                });
            }
            _ => {}
        }

        if !state.live_pits.remove(&request.pit_id) {
            return Err(ElasticError::NotFound {
                operation: "search_with_pit",
                id: request.pit_id.clone(),
            });
        }

        let after = request.search_after.as_deref().map(after_key);
        let mut hits: Vec<Value> = state
            .hits_for(&request.to_body())
            .into_iter()
            .filter(|h| after.is_none_or(|a| sort_key(h) > a))
            .take(request.size)
            .collect();

        match injected {
            Some(Failure::StalePage) => {
                let repeated = request.search_after.clone().unwrap_or_default();
                for hit in &mut hits {
                    hit["sort"] = Value::Array(repeated.clone());
                }
            }
            Some(Failure::MissingSort) => {
                for hit in &mut hits {
                    if let Some(obj) = hit.as_object_mut() {
                        obj.remove("sort");
                    }
                }
            }
            _ => {}
        }

        let partial = injected == Some(Failure::ShardFailure);
        if partial {
            hits.truncate(hits.len() / 2);
        }

        state.page_sizes.push(hits.len());
        let pit_id = state.next_pit();
        Ok(PitSearchResponse {
            pit_id: Some(pit_id),
            took: 2,
            timed_out: partial,
            shards: ShardStats {
                total: if partial { 4 } else { 1 },
                successful: if partial { 2 } else { 1 },
                skipped: 0,
                failed: if partial { 2 } else { 0 },
            },
            hits: HitsContainer { hits, total: None },
        })
    }

    async fn close_point_in_time(&self, pit_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.record(format!("close_pit:{pit_id}"));
        if state.fail_close {
            return Err(ElasticError::ServerBusy {
                operation: "close_point_in_time",
                status: 503,
                message: "unavailable".into(),
            });
        }
        state.live_pits.remove(pit_id);
        Ok(())
    }
}

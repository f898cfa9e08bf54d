//! Client-side pagination state for one partition
//!
//! The cursor holds the current PIT id and the sort key of the last emitted
//! hit. Every page must move that key strictly forward under the query's
//! sort order; anything else means the snapshot can no longer guarantee a
//! gap-free, duplicate-free result and the partition is aborted.

use std::cmp::Ordering;
use std::time::Duration;

use serde_json::Value;

use crate::client::PitSearchRequest;
use crate::error::{ElasticError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// Where hits without a value for a sort field are placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    First,
    Last,
}

/// One entry of a query's `sort` clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub direction: Direction,
    pub missing: Missing,
}

impl Default for SortKey {
    fn default() -> Self {
        Self {
            direction: Direction::Asc,
            missing: Missing::Last,
        }
    }
}

/// Sort keys of a query, in key order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOrder {
    keys: Vec<SortKey>,
}

impl SortOrder {
    /// Read the `sort` clause of a query body.
    ///
    /// Accepts `"field"`, `{"field": "desc"}` and
    /// `{"field": {"order": "desc", "missing": "_first"}}`. `_score`
    /// defaults to descending, everything else to ascending; missing values
    /// default to `_last`.
    pub fn from_query(body: &Value) -> Self {
        let entries = match &body["sort"] {
            Value::Array(entries) => entries.clone(),
            Value::Null => Vec::new(),
            single => vec![single.clone()],
        };
        Self {
            keys: entries.iter().map(parse_entry).collect(),
        }
    }

    /// Compare two sort keys position by position.
    pub fn compare(&self, a: &[Value], b: &[Value]) -> Ordering {
        for (i, (x, y)) in a.iter().zip(b).enumerate() {
            let key = self.keys.get(i).copied().unwrap_or_default();
            let ord = compare_key(x, y, key);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        a.len().cmp(&b.len())
    }
}

fn parse_entry(entry: &Value) -> SortKey {
    let (field, settings) = match entry {
        Value::String(field) => (field.as_str(), None),
        Value::Object(map) => match map.iter().next() {
            Some((field, settings)) => (field.as_str(), Some(settings)),
            None => return SortKey::default(),
        },
        _ => return SortKey::default(),
    };

    let (order, missing) = match settings {
        Some(Value::String(order)) => (Some(order.as_str()), None),
        Some(Value::Object(opts)) => (
            opts.get("order").and_then(Value::as_str),
            opts.get("missing").and_then(Value::as_str),
        ),
        _ => (None, None),
    };

    let direction = match order.map(str::to_ascii_lowercase).as_deref() {
        Some("desc") => Direction::Desc,
        Some(_) => Direction::Asc,
        None if field == "_score" => Direction::Desc,
        None => Direction::Asc,
    };
    // A custom missing value is substituted server-side, so only `_first`
    // moves nulls.
    let missing = match missing {
        Some("_first") => Missing::First,
        _ => Missing::Last,
    };

    SortKey { direction, missing }
}

/// Missing values go first or last in either direction.
fn compare_key(a: &Value, b: &Value, key: SortKey) -> Ordering {
    let null_side = match key.missing {
        Missing::First => Ordering::Less,
        Missing::Last => Ordering::Greater,
    };
    match (a.is_null(), b.is_null()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return null_side,
        (false, true) => return null_side.reverse(),
        _ => {}
    }
    let ord = compare_values(a, b);
    match key.direction {
        Direction::Asc => ord,
        Direction::Desc => ord.reverse(),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                x.cmp(&y)
            } else if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
                x.cmp(&y)
            } else {
                let x = x.as_f64().unwrap_or(f64::NAN);
                let y = y.as_f64().unwrap_or(f64::NAN);
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn render_key(key: &[Value]) -> String {
    serde_json::to_string(key).unwrap_or_else(|_| "?".into())
}

/// Pagination state within one partition.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportCursor {
    /// Latest PIT id; superseded ids are never reused.
    pub pit_id: String,
    /// Sort key of the last emitted hit; `None` before the first page.
    pub sort_values: Option<Vec<Value>>,
    pub page_size: usize,
    pub documents_emitted: u64,
    pub pages: u64,
}

impl ExportCursor {
    pub fn new(pit_id: String, page_size: usize) -> Self {
        Self {
            pit_id,
            sort_values: None,
            page_size,
            documents_emitted: 0,
            pages: 0,
        }
    }

    /// The request for the next page.
    pub fn next_request(&self, body: &Value, keep_alive: Duration) -> PitSearchRequest {
        PitSearchRequest {
            body: body.clone(),
            pit_id: self.pit_id.clone(),
            keep_alive,
            size: self.page_size,
            search_after: self.sort_values.clone(),
        }
    }

    /// Check that every hit of `hits` carries a sort key strictly after the
    /// previous one, starting from the cursor position.
    ///
    /// # Returns
    /// * `Result<Option<Vec<Value>>>` - Sort key of the last hit, `None` for
    ///   an empty page
    pub fn check_page(&self, order: &SortOrder, hits: &[Value]) -> Result<Option<Vec<Value>>> {
        let mut previous = self.sort_values.clone();
        for hit in hits {
            let Some(key) = hit.get("sort").and_then(Value::as_array) else {
                return Err(ElasticError::Consistency {
                    reason: format!(
                        "hit {} has no sort values",
                        hit.get("_id").and_then(Value::as_str).unwrap_or("<unknown>")
                    ),
                });
            };
            if let Some(prev) = &previous {
                if order.compare(key, prev) != Ordering::Greater {
                    return Err(ElasticError::Consistency {
                        reason: format!(
                            "sort key did not advance: {} after {}",
                            render_key(key),
                            render_key(prev)
                        ),
                    });
                }
            }
            previous = Some(key.clone());
        }
        Ok(if hits.is_empty() { None } else { previous })
    }

    /// Move past a validated page.
    pub fn advance(&mut self, next_pit_id: Option<String>, last_key: Option<Vec<Value>>, count: usize) {
        if let Some(id) = next_pit_id {
            self.pit_id = id;
        }
        if last_key.is_some() {
            self.sort_values = last_key;
        }
        self.documents_emitted += count as u64;
        self.pages += 1;
    }

    /// A short page means the partition is drained.
    pub fn is_last_page(&self, count: usize) -> bool {
        count < self.page_size
    }
}

//! Query sources and export query preparation
//!
//! - [`QuerySource`]: where the JSON query body comes from (file or stdin)
//! - [`prepare_export_query`]: makes a user query safe for `search_after`
//!   pagination (total sort order, no offsets)
//! - [`with_time_range`]: adds a `[from, to)` range filter on the timestamp
//!   field

use std::io::IsTerminal;
use std::path::PathBuf;

use serde_json::{Map, Value, json};
use tokio::io::AsyncReadExt;

use crate::error::{ElasticError, Result};

/// Per-shard document ordinal used as the final sort tie-breaker.
pub const TIE_BREAK_FIELD: &str = "_shard_doc";

/// Keys that only make sense for offset pagination or are set per page.
const PAGINATION_KEYS: [&str; 4] = ["size", "from", "search_after", "pit"];

/// Where a query body is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuerySource {
    File(PathBuf),
    Stdin,
}

impl QuerySource {
    /// `None` or `-` reads stdin.
    pub fn from_arg(path: Option<PathBuf>) -> Self {
        match path {
            Some(p) if p.as_os_str() != "-" => QuerySource::File(p),
            _ => QuerySource::Stdin,
        }
    }

    /// Read and parse the query body.
    ///
    /// # Returns
    /// * `Result<Value>` - JSON object, or a usage error when nothing was
    ///   provided or the text is not a JSON object
    pub async fn read(&self) -> Result<Value> {
        match self {
            QuerySource::File(path) => {
                let text = tokio::fs::read_to_string(path).await.map_err(|e| {
                    ElasticError::Usage(format!("cannot read query file {}: {e}", path.display()))
                })?;
                parse_query(&text, &path.display().to_string())
            }
            QuerySource::Stdin => {
                if std::io::stdin().is_terminal() {
                    return Err(no_query());
                }
                let mut text = String::new();
                tokio::io::stdin().read_to_string(&mut text).await?;
                parse_query(&text, "stdin")
            }
        }
    }
}

fn no_query() -> ElasticError {
    ElasticError::Usage("No query provided: pass --query <file> or pipe JSON on stdin".into())
}

/// Parse query text read from `origin`.
pub fn parse_query(text: &str, origin: &str) -> Result<Value> {
    if text.trim().is_empty() {
        return Err(no_query());
    }
    match serde_json::from_str::<Value>(text) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(_) => Err(ElasticError::Usage(format!(
            "query from {origin} must be a JSON object"
        ))),
        Err(e) => Err(ElasticError::Usage(format!("invalid JSON query from {origin}: {e}"))),
    }
}

/// Normalise a query body for PIT pagination.
///
/// The sort becomes an array, defaulting to ascending `timestamp_field`,
/// with `_shard_doc` appended when missing; pagination keys are removed.
pub fn prepare_export_query(query: &Value, timestamp_field: &str) -> Value {
    let mut body = match query {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    for key in PAGINATION_KEYS {
        body.remove(key);
    }

    let mut sort = match body.remove("sort") {
        Some(Value::Array(entries)) => entries,
        Some(Value::Null) | None => Vec::new(),
        Some(single) => vec![single],
    };
    if sort.is_empty() {
        sort.push(json!({ timestamp_field: "asc" }));
    }
    if !sort.iter().any(is_tie_break) {
        sort.push(json!({ TIE_BREAK_FIELD: "asc" }));
    }
    body.insert("sort".into(), Value::Array(sort));

    Value::Object(body)
}

fn is_tie_break(entry: &Value) -> bool {
    match entry {
        Value::String(field) => field == TIE_BREAK_FIELD,
        Value::Object(map) => map.contains_key(TIE_BREAK_FIELD),
        _ => false,
    }
}

/// Add a `range` filter (`gte` from, `lt` to) on `field`.
///
/// A `bool` query gets the range appended to its `filter` clause; any other
/// query is wrapped as `bool.must`.
pub fn with_time_range(body: &Value, field: &str, from: Option<&str>, to: Option<&str>) -> Value {
    if from.is_none() && to.is_none() {
        return body.clone();
    }

    let mut bounds = Map::new();
    if let Some(from) = from {
        bounds.insert("gte".into(), json!(from));
    }
    if let Some(to) = to {
        bounds.insert("lt".into(), json!(to));
    }
    let range = json!({ "range": { field: Value::Object(bounds) } });

    let mut body = match body {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    let query = match body.remove("query") {
        Some(Value::Object(mut query)) if query.len() == 1 && query.contains_key("bool") => {
            if let Some(Value::Object(clauses)) = query.get_mut("bool") {
                let filter = match clauses.remove("filter") {
                    Some(Value::Array(mut filters)) => {
                        filters.push(range);
                        filters
                    }
                    Some(single) => vec![single, range],
                    None => vec![range],
                };
                clauses.insert("filter".into(), Value::Array(filter));
            }
            Value::Object(query)
        }
        Some(other) => json!({ "bool": { "must": [other], "filter": [range] } }),
        None => json!({ "bool": { "filter": [range] } }),
    };
    body.insert("query".into(), query);

    Value::Object(body)
}

//! Time partitions for export
//!
//! A partition is a half-open `[from, to)` window on the timestamp field.
//! Splitting is manual: the caller chooses the window length, and no
//! partition is ever subdivided automatically.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, SecondsFormat, TimeDelta, Utc};
use serde_json::Value;

use crate::error::{ElasticError, Result};
use crate::query::with_time_range;

/// `[from, to)` bound on the timestamp field; `None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimePartition {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl TimePartition {
    /// The whole index.
    pub fn unbounded() -> Self {
        Self { from: None, to: None }
    }

    pub fn is_bounded(&self) -> bool {
        self.from.is_some() || self.to.is_some()
    }

    /// The query body restricted to this window.
    pub fn apply(&self, body: &Value, timestamp_field: &str) -> Value {
        let from = self.from.map(format_bound);
        let to = self.to.map(format_bound);
        with_time_range(body, timestamp_field, from.as_deref(), to.as_deref())
    }
}

impl fmt::Display for TimePartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let from = self.from.map(format_bound).unwrap_or_else(|| "*".into());
        let to = self.to.map(format_bound).unwrap_or_else(|| "*".into());
        write!(f, "[{from}, {to})")
    }
}

fn format_bound(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse `YYYY-MM-DD` (midnight UTC) or an RFC 3339 timestamp.
pub fn parse_date(input: &str) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }
    DateTime::parse_from_rfc3339(input)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            ElasticError::Usage(format!(
                "invalid date '{input}': expected YYYY-MM-DD or RFC 3339"
            ))
        })
}

/// Build the partitions for an export.
///
/// # Arguments
/// * `from` - Inclusive lower bound, if any
/// * `to` - Exclusive upper bound, if any
/// * `every` - Window length; requires both bounds
///
/// # Returns
/// * `Result<Vec<TimePartition>>` - Consecutive, non-overlapping windows in
///   chronological order
pub fn split(
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    every: Option<Duration>,
) -> Result<Vec<TimePartition>> {
    if let (Some(from), Some(to)) = (from, to) {
        if from >= to {
            return Err(ElasticError::Usage(format!(
                "--from-date ({}) must be before --to-date ({})",
                format_bound(from),
                format_bound(to)
            )));
        }
    }

    let Some(every) = every else {
        return Ok(vec![TimePartition { from, to }]);
    };

    let (Some(from), Some(to)) = (from, to) else {
        return Err(ElasticError::Usage(
            "--partition-every requires both --from-date and --to-date".into(),
        ));
    };
    let step = TimeDelta::from_std(every)
        .ok()
        .filter(|step| *step > TimeDelta::zero())
        .ok_or_else(|| ElasticError::Usage("--partition-every must be a positive duration".into()))?;

    let mut partitions = Vec::new();
    let mut start = from;
    while start < to {
        let end = start.checked_add_signed(step).map_or(to, |end| end.min(to));
        partitions.push(TimePartition {
            from: Some(start),
            to: Some(end),
        });
        start = end;
    }
    Ok(partitions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn day(s: &str) -> DateTime<Utc> {
        parse_date(s).unwrap()
    }

    #[test]
    fn test_parse_date_forms() {
        assert_eq!(format_bound(day("2025-01-15")), "2025-01-15T00:00:00Z");
        assert_eq!(
            format_bound(day("2025-01-15T10:30:00+02:00")),
            "2025-01-15T08:30:00Z"
        );
        assert!(matches!(parse_date("15/01/2025"), Err(ElasticError::Usage(_))));
    }

    #[test]
    fn test_without_split_is_one_partition() {
        let parts = split(Some(day("2025-01-01")), Some(day("2025-02-01")), None).unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].to_string(), "[2025-01-01T00:00:00Z, 2025-02-01T00:00:00Z)");

        let parts = split(None, None, None).unwrap();
        assert_eq!(parts, vec![TimePartition::unbounded()]);
        assert!(!parts[0].is_bounded());
        assert_eq!(parts[0].to_string(), "[*, *)");
    }

    #[test]
    fn test_split_covers_range_without_overlap() {
        let from = day("2025-01-01");
        let to = day("2025-01-31");
        let parts = split(Some(from), Some(to), Some(Duration::from_secs(7 * 86400))).unwrap();

        assert_eq!(parts.len(), 5);
        assert_eq!(parts[0].from, Some(from));
        assert_eq!(parts.last().unwrap().to, Some(to));
        for pair in parts.windows(2) {
            assert_eq!(pair[0].to, pair[1].from);
        }
        // The last window is clipped to the upper bound.
        assert_eq!(parts[4].from, Some(day("2025-01-29")));
    }

    #[test]
    fn test_split_rejects_bad_input() {
        let from = Some(day("2025-02-01"));
        let to = Some(day("2025-01-01"));
        assert!(split(from, to, None).is_err());
        assert!(split(to, None, Some(Duration::from_secs(3600))).is_err());
        assert!(split(to, from, Some(Duration::ZERO)).is_err());
    }

    #[test]
    fn test_apply_injects_range() {
        let part = TimePartition {
            from: Some(day("2025-01-01")),
            to: Some(day("2025-01-16")),
        };
        let body = part.apply(&json!({"query": {"match_all": {}}}), "@timestamp");
        assert_eq!(
            body["query"]["bool"]["filter"][0],
            json!({"range": {"@timestamp": {"gte": "2025-01-01T00:00:00Z", "lt": "2025-01-16T00:00:00Z"}}})
        );

        let untouched = TimePartition::unbounded().apply(&json!({"size": 1}), "@timestamp");
        assert_eq!(untouched, json!({"size": 1}));
    }
}

//! Human-readable output for command results
//!
//! Hits themselves go through the export writers; this module only renders
//! the status lines printed around them:
//! - async search handles (submit, status, wait)
//! - shard progress for the `wait` spinner
//! - export reports

use std::fmt::Write as _;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::client::ShardStats;
use crate::executor::export::ExportReport;
use crate::executor::{AsyncSearchHandle, SearchState};

/// Format shard progress, e.g. `3/5 (skipped: 0, failed: 1)`.
pub fn format_shards(shards: &ShardStats) -> String {
    format!(
        "{}/{} (skipped: {}, failed: {})",
        shards.successful, shards.total, shards.skipped, shards.failed
    )
}

fn format_status(state: SearchState) -> &'static str {
    match state {
        SearchState::Running => "Running",
        SearchState::PartialTimeout => "Complete (partial)",
        SearchState::Complete => "Complete",
    }
}

fn format_epoch_ms(ms: u64) -> String {
    i64::try_from(ms)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| ms.to_string())
}

/// Render a handle as indented `key: value` lines under a headline.
///
/// # Arguments
/// * `headline` - First line, e.g. `Search submitted!`
/// * `handle` - Snapshot to describe
///
/// # Returns
/// * `String` - Multi-line text without trailing newline
pub fn format_handle(headline: &str, handle: &AsyncSearchHandle) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{headline}");
    let _ = writeln!(out, "  Search ID: {}", handle.id);
    let _ = writeln!(out, "  Status: {}", format_status(handle.state()));
    let _ = writeln!(out, "  Partial: {}", handle.is_partial);
    let _ = writeln!(out, "  Shards: {}", format_shards(&handle.shards));
    let _ = writeln!(out, "  Took: {}ms", handle.took_ms);
    match handle.total_hits {
        Some(total) => {
            let _ = writeln!(out, "  Hits returned: {} (of {})", handle.hits_returned, total);
        }
        None => {
            let _ = writeln!(out, "  Hits returned: {}", handle.hits_returned);
        }
    }
    if let Some(keep_alive) = handle.keep_alive {
        let _ = writeln!(out, "  Keep alive: {}", humantime::format_duration(keep_alive));
    }
    if let Some(expires) = handle.expiration_ms {
        let _ = writeln!(out, "  Expires: {}", format_epoch_ms(expires));
    }
    out.trim_end().to_string()
}

/// Spinner message for one `wait` poll.
pub fn format_poll(handle: &AsyncSearchHandle) -> String {
    format!("Waiting... Shards: {}", format_shards(&handle.shards))
}

fn format_elapsed(elapsed: Duration) -> String {
    // Round down to tenths of a second.
    let rounded = Duration::from_millis(elapsed.as_millis() as u64 / 100 * 100);
    humantime::format_duration(rounded).to_string()
}

/// Summarize an export, one line per partition when there are several.
pub fn format_export_report(report: &ExportReport) -> String {
    let mut out = String::new();
    if report.partitions.len() > 1 {
        for partition in &report.partitions {
            let _ = writeln!(
                out,
                "  {}: {} documents ({} pages, {})",
                partition.label,
                partition.documents,
                partition.pages,
                format_elapsed(partition.elapsed)
            );
        }
    }
    let _ = write!(
        out,
        "Exported {} documents ({} bytes) in {}",
        report.total_documents,
        report.bytes_written,
        format_elapsed(report.elapsed)
    );
    out
}

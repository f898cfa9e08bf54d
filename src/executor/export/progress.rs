//! Progress tracking for long-running operations
//!
//! This module provides spinners and statistics tracking for exports and
//! for the `wait` poll loop, giving users real-time feedback on stderr.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};

/// Progress tracker
///
/// Tracks documents written and displays a spinner with the current
/// partition and throughput. A disabled tracker is a no-op.
pub struct ProgressTracker {
    /// Number of documents processed so far
    processed: AtomicU64,
    /// Start time of the operation
    start_time: Instant,
    /// Spinner (optional, can be disabled)
    bar: Option<ProgressBar>,
}

impl ProgressTracker {
    /// Create a document-count tracker for exports
    ///
    /// # Arguments
    /// * `enable_bar` - Whether to display a spinner
    ///
    /// # Returns
    /// * `Self` - New progress tracker instance
    pub fn new(enable_bar: bool) -> Self {
        Self::with_template(enable_bar, "{spinner:.green} {prefix} {pos} documents {msg}")
    }

    /// Create a spinner for the `wait` poll loop.
    pub fn for_wait(enable_bar: bool) -> Self {
        Self::with_template(enable_bar, "{spinner:.green} [{elapsed}] {msg}")
    }

    /// Tracker that never draws.
    pub fn hidden() -> Self {
        Self::new(false)
    }

    fn with_template(enable_bar: bool, template: &str) -> Self {
        let bar = enable_bar.then(|| {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::default_spinner()
                    .template(template)
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            bar.enable_steady_tick(std::time::Duration::from_millis(120));
            bar
        });

        Self {
            processed: AtomicU64::new(0),
            start_time: Instant::now(),
            bar,
        }
    }

    /// Show which partition is being exported.
    pub fn set_partition(&self, label: &str) {
        if let Some(ref bar) = self.bar {
            bar.set_prefix(label.to_string());
        }
    }

    /// Replace the status message.
    pub fn set_message(&self, message: String) {
        if let Some(ref bar) = self.bar {
            bar.set_message(message);
        }
    }

    /// Update progress with new count
    ///
    /// # Arguments
    /// * `count` - Total number of documents processed so far
    pub fn update(&self, count: u64) {
        self.processed.store(count, Ordering::Relaxed);

        if let Some(ref bar) = self.bar {
            bar.set_position(count);

            let elapsed = self.start_time.elapsed().as_secs_f64();
            if elapsed > 0.0 {
                let speed = count as f64 / elapsed;
                bar.set_message(format!("({:.0} docs/sec)", speed));
            }
        }
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Finish and clear the spinner
    pub fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_tracker_counts() {
        let tracker = ProgressTracker::hidden();
        tracker.set_partition("[*, *)");
        tracker.update(500);
        tracker.set_message("polling".into());
        tracker.finish();
        assert_eq!(tracker.processed(), 500);
    }

    #[test]
    fn test_wait_tracker_without_bar() {
        let tracker = ProgressTracker::for_wait(false);
        tracker.update(1);
        assert_eq!(tracker.processed(), 1);
    }
}

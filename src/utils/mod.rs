//! Utility functions and helpers for elastic-utils
//!
//! - Duration parsing for command-line flags
//! - Conversion to Elasticsearch time-unit strings (`10m`, `1h`, `500ms`)

/// Time and duration utilities
pub mod time {
    use std::time::Duration;

    const MS_PER_SECOND: u128 = 1_000;
    const MS_PER_MINUTE: u128 = 60 * MS_PER_SECOND;
    const MS_PER_HOUR: u128 = 60 * MS_PER_MINUTE;
    const MS_PER_DAY: u128 = 24 * MS_PER_HOUR;

    /// Render a duration in the largest Elasticsearch unit that represents
    /// it exactly.
    ///
    /// Sub-millisecond precision is truncated; a zero duration renders as
    /// `0ms`.
    pub fn to_es_time(duration: Duration) -> String {
        let ms = duration.as_millis();
        if ms == 0 {
            return "0ms".to_string();
        }

        for (unit_ms, suffix) in [
            (MS_PER_DAY, "d"),
            (MS_PER_HOUR, "h"),
            (MS_PER_MINUTE, "m"),
            (MS_PER_SECOND, "s"),
        ] {
            if ms % unit_ms == 0 {
                return format!("{}{}", ms / unit_ms, suffix);
            }
        }

        format!("{ms}ms")
    }

    /// Parse a human duration flag such as `5s`, `10m` or `1h 30m`.
    ///
    /// Used as a clap `value_parser`.
    pub fn parse_duration(input: &str) -> std::result::Result<Duration, String> {
        humantime::parse_duration(input.trim()).map_err(|e| format!("invalid duration '{input}': {e}"))
    }

}

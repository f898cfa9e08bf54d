use std::io;
use std::time::Duration;

use thiserror::Error;

/// Crate-wide `Result` type using [`ElasticError`] as the error.
///
/// This alias is re-exported by the parent `error` module and is intended
/// to be used throughout the crate for fallible operations.
pub type Result<T> = std::result::Result<T, ElasticError>;

/// Exit code for a generic failure (transport, server, I/O).
pub const EXIT_FAILURE: i32 = 1;
/// Exit code for user errors: bad flags, bad query, unknown index, bad config.
pub const EXIT_USAGE: i32 = 2;
/// Exit code for an unknown or expired search id.
pub const EXIT_NOT_FOUND: i32 = 3;
/// Exit code for an exceeded client-side wait budget.
pub const EXIT_TIMEOUT: i32 = 4;
/// Exit code for protocol violations and unexpected response shapes.
pub const EXIT_CONSISTENCY: i32 = 5;
/// Exit code when interrupted by Ctrl+C.
pub const EXIT_CANCELLED: i32 = 130;

/// Top-level error type for elastic-utils operations.
///
/// Only [`ElasticError::Transport`], [`ElasticError::ServerBusy`] and
/// [`ElasticError::Throttled`] are transient; every other class is surfaced
/// to the caller immediately.
#[derive(Debug, Error)]
pub enum ElasticError {
    /// Network or connectivity failure (retryable).
    #[error("transport error during {operation}: {message}")]
    Transport {
        operation: &'static str,
        message: String,
    },

    /// 5xx response from the cluster (retryable).
    #[error("server busy during {operation} (HTTP {status}): {message}")]
    ServerBusy {
        operation: &'static str,
        status: u16,
        message: String,
    },

    /// HTTP 429: the cluster rejected the request under load. The only
    /// 4xx status that is retried.
    #[error("rate limited during {operation} (HTTP 429): {message}")]
    Throttled {
        operation: &'static str,
        message: String,
    },

    /// Malformed request rejected by the cluster.
    #[error("query rejected during {operation} (HTTP {status}): {message}")]
    Query {
        operation: &'static str,
        status: u16,
        message: String,
    },

    /// The index or alias does not exist.
    #[error("index not found: {index} ({message})")]
    InvalidIndex { index: String, message: String },

    /// Credentials missing, invalid, or lacking privileges.
    #[error("not authorized during {operation} (HTTP {status}): {message}")]
    Unauthorized {
        operation: &'static str,
        status: u16,
        message: String,
    },

    /// Unknown or expired async search / point-in-time id.
    #[error("{operation}: id not found or expired: {id}")]
    NotFound { operation: &'static str, id: String },

    /// Client-side wait budget exceeded; the job is left running.
    #[error("search {search_id} still running after {}", format_waited(.waited))]
    Timeout { search_id: String, waited: Duration },

    /// Non-advancing sort key or lapsed point-in-time.
    #[error("consistency error: {reason}")]
    Consistency { reason: String },

    /// Response did not have the expected shape.
    #[error("unexpected response from {operation}: {message}")]
    Deserialization {
        operation: &'static str,
        message: String,
    },

    /// Interrupted by the user.
    #[error("operation cancelled")]
    Cancelled,

    /// Bad command-line input.
    #[error("{0}")]
    Usage(String),

    /// Configuration errors.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A failure inside one export partition.
    #[error("partition {partition} failed: {source}")]
    Partition {
        partition: String,
        #[source]
        source: Box<ElasticError>,
    },
}

/// Configuration-specific errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("cannot read config file {path}: {message}")]
    Unreadable { path: String, message: String },

    /// Invalid config format.
    #[error("invalid config format: {0}")]
    InvalidFormat(String),

    /// Missing required field.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// Invalid field value.
    #[error("invalid value '{value}' for field '{field}'")]
    InvalidValue { field: String, value: String },
}

impl ElasticError {
    /// Whether the retry policy may re-issue the failed request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ElasticError::Transport { .. }
                | ElasticError::ServerBusy { .. }
                | ElasticError::Throttled { .. }
        )
    }

    /// The innermost error, looking through partition context.
    pub fn root(&self) -> &ElasticError {
        match self {
            ElasticError::Partition { source, .. } => source.root(),
            other => other,
        }
    }

    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        match self.root() {
            ElasticError::Usage(_)
            | ElasticError::Query { .. }
            | ElasticError::InvalidIndex { .. }
            | ElasticError::Unauthorized { .. }
            | ElasticError::Config(_) => EXIT_USAGE,
            ElasticError::NotFound { .. } => EXIT_NOT_FOUND,
            ElasticError::Timeout { .. } => EXIT_TIMEOUT,
            ElasticError::Consistency { .. } | ElasticError::Deserialization { .. } => {
                EXIT_CONSISTENCY
            }
            ElasticError::Cancelled => EXIT_CANCELLED,
            _ => EXIT_FAILURE,
        }
    }

    /// Attach the partition label to an export failure.
    pub fn in_partition(self, partition: impl Into<String>) -> Self {
        match self {
            already @ ElasticError::Partition { .. } => already,
            other => ElasticError::Partition {
                partition: partition.into(),
                source: Box::new(other),
            },
        }
    }

    pub(crate) fn deserialization(operation: &'static str, err: impl std::fmt::Display) -> Self {
        ElasticError::Deserialization {
            operation,
            message: err.to_string(),
        }
    }
}

fn format_waited(waited: &Duration) -> humantime::FormattedDuration {
    humantime::format_duration(*waited)
}

impl From<serde_json::Error> for ElasticError {
    fn from(err: serde_json::Error) -> Self {
        ElasticError::deserialization("json", err)
    }
}

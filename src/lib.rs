//! Elasticsearch async search and export library
//!
//! This library provides the core of the `elastic-utils` command-line tool.
//! It can be used on its own to script async searches or to stream full
//! result sets out of a cluster.
//!
//! # Modules
//!
//! - `cli`: Command-line interface and command handlers
//! - `client`: Elasticsearch transport and response models
//! - `config`: Configuration management
//! - `error`: Error types and exit codes
//! - `executor`: Async search controller and export pipeline
//! - `formatter`: Human-readable status output
//! - `query`: Query loading and export query preparation
//! - `utils`: Utility functions and helpers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use elastic_utils::client::{HttpSearchClient, RetryPolicy};
//! use elastic_utils::config::Config;
//! use elastic_utils::executor::AsyncSearchController;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let client = Arc::new(HttpSearchClient::new(&config.connection)?);
//!     let controller = AsyncSearchController::new(client, RetryPolicy::from_config(&config.retry));
//!
//!     let query = serde_json::json!({ "query": { "match_all": {} } });
//!     let handle = controller
//!         .submit("logs-*", &query, Duration::from_secs(3600), Some(Duration::from_secs(1)))
//!         .await?;
//!     println!("Submitted {}", handle.id);
//!
//!     controller.delete(&handle.id).await?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod formatter;
pub mod query;
pub mod utils;

// Re-export commonly used types
pub use client::{HttpSearchClient, SearchClient};
pub use config::Config;
pub use error::{ElasticError, Result};
pub use executor::{AsyncSearchController, ExportPipeline};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
///
/// # Returns
/// * `&str` - Version string
pub fn version() -> &'static str {
    VERSION
}

//! Error handling module for Elasticsearch operations.
//!
//! This module provides:
//! - The crate-wide [`ElasticError`] taxonomy (transient vs. fatal classes)
//! - Structured extraction of Elasticsearch error bodies
//! - Exit-code mapping so scripts can branch on the outcome
//!
//! # Example
//!
//! ```rust,no_run
//! use elastic_utils::error::{ElasticError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(ElasticError::Usage("no query provided".to_string()))
//! }
//!
//! if let Err(err) = example_operation() {
//!     assert_eq!(err.exit_code(), 2);
//! }
//! ```

pub mod elastic;
pub mod kinds;

// Re-export commonly used types
pub use elastic::{ErrorCause, ErrorInfo};
pub use kinds::{ConfigError, ElasticError, Result};

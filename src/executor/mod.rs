//! Execution engine for elastic-utils
//!
//! This module provides the two cooperating components behind the CLI:
//! - [`async_search`]: drives one async search job through submit, poll,
//!   fetch and delete
//! - [`export`]: streams a full result set through point-in-time pagination
//!
//! Both take an explicitly constructed `Arc<dyn SearchClient>` and share
//! only the retry policy and the output writers.

pub mod async_search;
pub mod export;

pub use async_search::{
    AsyncSearchController, AsyncSearchHandle, DeleteOutcome, FetchResult, SearchState, WaitOptions,
};
pub use export::{ExportPipeline, ExportPlan, ExportReport};

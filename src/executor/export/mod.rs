//! Export module for full-result streaming exports
//!
//! This module streams every document matching a query out of an index,
//! however large, using point-in-time snapshots and `search_after`
//! pagination.
//!
//! # Architecture
//!
//! The export system is built on these components:
//!
//! 1. **StreamingQuery**: one partition's PIT session, yielding one page per call
//! 2. **ExportCursor**: the PIT id and last sort key, checked for strict progress
//! 3. **TimePartition**: optional `[from, to)` windows, processed sequentially
//! 4. **ProgressTracker**: real-time progress feedback
//! 5. **FormatWriter**: JSON Lines or JSON array output
//!
//! These components are orchestrated by the **ExportPipeline**.

pub mod coordinator;
pub mod cursor;
pub mod partition;
pub mod progress;
pub mod streaming;
pub mod writers;

pub use coordinator::{ExportPipeline, ExportPlan, ExportReport, PartitionReport};
pub use cursor::{ExportCursor, SortOrder};
pub use partition::TimePartition;
pub use progress::ProgressTracker;
pub use streaming::{PitStreamingQuery, StreamingQuery};
pub use writers::{FormatWriter, HitsFormat, JsonArrayWriter, JsonLWriter, OutputTarget};

//! Format writers for hit output
//!
//! This module provides a unified interface for writing search hits to an
//! output target in one of the supported formats:
//! - JSON Lines: one compact document per line (default)
//! - JSON: a single pretty-printed array, streamed element by element
//!
//! The same writers back both `get` and `export`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs::File;
use tokio::io::{AsyncWrite, BufWriter};
use tracing::debug;

use crate::error::{ElasticError, Result};

pub mod json;
pub mod jsonl;

pub use json::JsonArrayWriter;
pub use jsonl::JsonLWriter;

/// Boxed async byte sink behind every writer.
pub type Output = Box<dyn AsyncWrite + Unpin + Send>;

const FILE_BUFFER_CAPACITY: usize = 1024 * 1024;

/// Trait for writing hits in a given format
#[async_trait]
pub trait FormatWriter: Send {
    /// Write a batch of hits, in order
    ///
    /// # Arguments
    /// * `docs` - Hits exactly as returned by the cluster
    ///
    /// # Returns
    /// * `Result<usize>` - Number of hits written
    async fn write_batch(&mut self, docs: &[Value]) -> Result<usize>;

    /// Push buffered bytes to the target so that what is written so far is
    /// a complete prefix.
    async fn flush(&mut self) -> Result<()>;

    /// Write any trailer and flush. Calling it again is a no-op.
    async fn finalize(&mut self) -> Result<()>;

    /// Bytes produced so far.
    fn bytes_written(&self) -> u64;
}

/// Output format selected on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum HitsFormat {
    /// One JSON document per line
    #[default]
    Jsonl,
    /// A single JSON array
    Json,
}

/// Where hits are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Stdout,
    File(PathBuf),
}

impl OutputTarget {
    /// `None` or `-` means stdout.
    pub fn from_arg(path: Option<&Path>) -> Self {
        match path {
            Some(p) if p.as_os_str() != "-" => OutputTarget::File(p.to_path_buf()),
            _ => OutputTarget::Stdout,
        }
    }

    async fn open(&self) -> Result<Output> {
        match self {
            OutputTarget::Stdout => Ok(Box::new(tokio::io::stdout())),
            OutputTarget::File(path) => {
                validate_path(path)?;
                let file = File::create(path).await?;
                debug!("Created output file: {}", path.display());
                Ok(Box::new(BufWriter::with_capacity(FILE_BUFFER_CAPACITY, file)))
            }
        }
    }
}

/// Open `target` and wrap it in the writer for `format`.
///
/// # Arguments
/// * `target` - Stdout or a file path (created or truncated)
/// * `format` - Output format
///
/// # Returns
/// * `Result<Box<dyn FormatWriter>>` - Ready writer or I/O error
pub async fn open_writer(target: &OutputTarget, format: HitsFormat) -> Result<Box<dyn FormatWriter>> {
    let output = target.open().await?;
    Ok(match format {
        HitsFormat::Jsonl => Box::new(JsonLWriter::new(output)),
        HitsFormat::Json => Box::new(JsonArrayWriter::new(output)),
    })
}

/// Check that the parent directory of `path` exists.
fn validate_path(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(ElasticError::Usage(format!(
                "Directory does not exist: {}",
                parent.display()
            )));
        }
    }
    Ok(())
}

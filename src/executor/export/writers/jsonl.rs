//! JSON Lines writer
//!
//! Each hit is written as one compact JSON document followed by a newline,
//! so a truncated output is still a valid JSON Lines file up to the last
//! complete line.

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::error::Result;

use super::{FormatWriter, Output};

/// Writer for JSON Lines format
pub struct JsonLWriter<W = Output> {
    writer: W,
    /// Number of documents written
    written: usize,
    bytes: u64,
    finalized: bool,
}

impl<W: AsyncWrite + Unpin + Send> JsonLWriter<W> {
    /// Create a new JSON Lines writer
    ///
    /// # Arguments
    /// * `writer` - Byte sink, typically buffered
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            written: 0,
            bytes: 0,
            finalized: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> FormatWriter for JsonLWriter<W> {
    async fn write_batch(&mut self, docs: &[Value]) -> Result<usize> {
        let mut chunk = Vec::with_capacity(docs.len() * 256);
        for doc in docs {
            serde_json::to_writer(&mut chunk, doc)?;
            chunk.push(b'\n');
        }
        self.writer.write_all(&chunk).await?;

        self.written += docs.len();
        self.bytes += chunk.len() as u64;
        debug!("Wrote {} documents to JSON Lines (total: {})", docs.len(), self.written);

        Ok(docs.len())
    }

    async fn flush(&mut self) -> Result<()> {
        self.writer.flush().await?;
        Ok(())
    }

    async fn finalize(&mut self) -> Result<()> {
        if self.finalized {
            return Ok(());
        }
        self.finalized = true;
        self.writer.flush().await?;
        debug!("Finalized JSON Lines output ({} documents)", self.written);
        Ok(())
    }

    fn bytes_written(&self) -> u64 {
        self.bytes
    }
}

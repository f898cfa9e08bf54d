//! Streaming JSON array writer
//!
//! Writes `[`, then each hit pretty-printed with a two-space indent, then
//! `]` on finalize. Nothing is buffered beyond the current batch.

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::error::Result;

use super::{FormatWriter, Output};

const INDENT: &str = "  ";

pub struct JsonArrayWriter<W = Output> {
    writer: W,
    written: usize,
    bytes: u64,
    finalized: bool,
}

impl<W: AsyncWrite + Unpin + Send> JsonArrayWriter<W> {
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

    async fn emit(&mut self, text: &str) -> Result<()> {
        self.writer.write_all(text.as_bytes()).await?;
        self.bytes += text.len() as u64;
        Ok(())
    }
}

/// Pretty-print `doc` as an array element: every line indented once.
fn render_element(doc: &Value) -> Result<String> {
    let pretty = serde_json::to_string_pretty(doc)?;
    let mut out = String::with_capacity(pretty.len() + 16);
    for (i, line) in pretty.lines().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(INDENT);
        out.push_str(line);
    }
    Ok(out)
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> FormatWriter for JsonArrayWriter<W> {
    async fn write_batch(&mut self, docs: &[Value]) -> Result<usize> {
        let mut chunk = String::new();
        for doc in docs {
            chunk.push_str(if self.written == 0 { "[\n" } else { ",\n" });
            chunk.push_str(&render_element(doc)?);
            self.written += 1;
        }
        self.emit(&chunk).await?;
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
        let trailer = if self.written == 0 { "[]\n" } else { "\n]\n" };
        self.emit(trailer).await?;
        self.writer.flush().await?;
        debug!("Finalized JSON array output ({} documents)", self.written);
        Ok(())
    }

    fn bytes_written(&self) -> u64 {
        self.bytes
    }
}

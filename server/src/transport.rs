//! Worker transport
//!
//! Newline-delimited JSON framing of the worker protocol, one message per line.

use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use vecscope_core::{RequestId, WorkerRequest, WorkerResponse};

/// A line read from the client
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Request(WorkerRequest),
    /// Not a valid request. `id` is recovered when the line is JSON with a
    /// numeric `id` field.
    Malformed { id: Option<RequestId>, error: String },
}

/// Reads worker requests from a line-oriented stream
pub struct RequestReader<R> {
    reader: R,
    line: Vec<u8>,
}

impl<R: AsyncBufRead + Unpin> RequestReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: Vec::new(),
        }
    }

    /// Read the next request, skipping blank lines. `None` at EOF.
    ///
    /// Lines are taken as raw bytes; invalid UTF-8 is a malformed request,
    /// not a stream error.
    pub async fn read_request(&mut self) -> io::Result<Option<Inbound>> {
        loop {
            self.line.clear();
            let bytes_read = self.reader.read_until(b'\n', &mut self.line).await?;
            if bytes_read == 0 {
                return Ok(None); // EOF
            }

            let line = self.line.trim_ascii();
            if line.is_empty() {
                continue;
            }

            return Ok(Some(match serde_json::from_slice(line) {
                Ok(request) => Inbound::Request(request),
                Err(e) => {
                    tracing::error!("Failed to parse worker request: {}", e);
                    Inbound::Malformed {
                        id: recover_id(line),
                        error: format!("Parse error: {}", e),
                    }
                }
            }));
        }
    }
}

impl RequestReader<BufReader<tokio::io::Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

fn recover_id(line: &[u8]) -> Option<RequestId> {
    serde_json::from_slice::<serde_json::Value>(line)
        .ok()?
        .get("id")?
        .as_u64()
}

/// Writes worker responses, one JSON document per line
pub struct ResponseWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> ResponseWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub async fn write_response(&mut self, response: &WorkerResponse) -> io::Result<()> {
        let mut line = serde_json::to_vec(response)?;
        line.push(b'\n');
        self.writer.write_all(&line).await?;
        self.writer.flush().await
    }
}

impl ResponseWriter<tokio::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

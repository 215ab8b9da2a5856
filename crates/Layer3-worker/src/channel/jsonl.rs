//! Newline-delimited JSON over async byte streams (stdin / stdout in the CLI)

use super::{memory_channel, MemoryTaskSource, ResponseSink, TaskSource};
use async_trait::async_trait;
use hermes_foundation::{Error, Outbound, Result};
use std::io::BufRead;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, error};

/// One task per line; blank lines are ignored.
///
/// Lines are decoded lossily, so a stray non-UTF-8 byte reaches the
/// dispatcher as U+FFFD and the task can still be answered.
pub struct JsonLinesSource<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: AsyncBufRead + Unpin + Send> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
        }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> TaskSource for JsonLinesSource<R> {
    async fn next(&mut self) -> Result<Option<String>> {
        loop {
            self.buf.clear();
            let read = self
                .reader
                .read_until(b'\n', &mut self.buf)
                .await
                .map_err(|e| Error::Channel(format!("task stream: {}", e)))?;
            if read == 0 {
                return Ok(None);
            }

            if let Some(line) = decode_line(&self.buf) {
                return Ok(Some(line));
            }
        }
    }
}

/// Read lines on a dedicated OS thread and hand them to a [`MemoryTaskSource`].
///
/// Blocking reads on a process stdin cannot be cancelled, so the CLI keeps
/// them off the runtime; the thread is simply abandoned at exit. It stops on
/// EOF, on a read error, or once the source is dropped.
pub fn spawn_line_reader<R>(mut reader: R) -> Result<MemoryTaskSource>
where
    R: BufRead + Send + 'static,
{
    let (sender, source) = memory_channel();
    std::thread::Builder::new()
        .name("task-reader".to_string())
        .spawn(move || {
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf) {
                    Ok(0) => break,
                    Ok(_) => {}
                    Err(e) => {
                        error!("Task stream failed: {}", e);
                        break;
                    }
                }
                if let Some(line) = decode_line(&buf) {
                    if sender.send_raw(line).is_err() {
                        break;
                    }
                }
            }
            debug!("Task reader finished");
        })?;
    Ok(source)
}

fn decode_line(raw: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim_end_matches(['\n', '\r']);
    if line.trim().is_empty() {
        None
    } else {
        Some(line.to_string())
    }
}

/// One outbound message per line, flushed immediately
pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
}

impl<W: AsyncWrite + Unpin + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> ResponseSink for JsonLinesSink<W> {
    async fn publish(&self, message: &Outbound) -> Result<()> {
        let mut line = serde_json::to_vec(message)?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer
            .write_all(&line)
            .await
            .map_err(|e| Error::Channel(format!("outbound stream: {}", e)))?;
        writer
            .flush()
            .await
            .map_err(|e| Error::Channel(format!("outbound stream: {}", e)))
    }
}

//! Server-sent events transport.
//!
//! Subscribes to the server's event stream and republishes every decoded
//! event onto the bus. Connection loss triggers a delayed reconnect; a
//! malformed line is logged and skipped rather than tearing the stream down.

use std::time::Duration;

use anyhow::{Context, Result};
use futures::StreamExt;

use crate::events::{EventSender, StreamEvent};

/// Default delay before reconnecting a dropped stream.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(3);

pub struct SseTransport {
    client: reqwest::Client,
    url: String,
    sender: EventSender,
    retry_delay: Duration,
}

impl SseTransport {
    pub fn new(url: impl Into<String>, sender: EventSender) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            sender,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Run the subscribe-decode-publish loop until the task is cancelled.
    pub async fn run(&self) {
        loop {
            match self.stream_once().await {
                Ok(()) => {
                    tracing::info!("event stream ended; reconnecting");
                }
                Err(e) => {
                    tracing::warn!("event stream error: {e:#}; reconnecting");
                }
            }
            tokio::time::sleep(self.retry_delay).await;
        }
    }

    /// One connection lifetime: open the stream and publish until it closes.
    async fn stream_once(&self) -> Result<()> {
        let response = self
            .client
            .get(&self.url)
            .header("Accept", "text/event-stream")
            .send()
            .await
            .context("Failed to connect to event stream")?;

        if !response.status().is_success() {
            anyhow::bail!("Event stream returned status {}", response.status());
        }

        let mut stream = response.bytes_stream();
        let mut buffer = LineBuffer::default();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("Event stream read failed")?;
            for line in buffer.push(&chunk) {
                if let Some(event) = parse_sse_line(&line) {
                    self.sender.publish(event);
                }
            }
        }

        Ok(())
    }
}

/// Reassembles complete lines from arbitrarily split network chunks.
///
/// Chunk boundaries can land mid-codepoint, so bytes are buffered raw and
/// only decoded once a full line (a byte-safe `\n` boundary) is available.
#[derive(Default)]
struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(newline) = self.buf.iter().position(|&b| b == b'\n') {
            let rest = self.buf.split_off(newline + 1);
            self.buf.pop();
            let line = String::from_utf8_lossy(&self.buf)
                .trim_end_matches('\r')
                .to_string();
            self.buf = rest;
            lines.push(line);
        }
        lines
    }
}

/// Decode one SSE line into a stream event.
///
/// Only `data:` lines carry events; comments, blank keep-alives, and the
/// `[DONE]` sentinel yield nothing. Undecodable payloads are logged and
/// dropped.
fn parse_sse_line(line: &str) -> Option<StreamEvent> {
    let data = line.strip_prefix("data:")?.trim();
    if data.is_empty() || data == "[DONE]" {
        return None;
    }
    match serde_json::from_str(data) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::warn!("skipping undecodable stream event: {e}");
            None
        }
    }
}

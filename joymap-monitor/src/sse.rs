//! Event-stream (SSE) framing and the HTTP connector
//!
//! The backend pushes `text/event-stream` frames:
//!
//! ```text
//! data: {"event_name": "BTN_SOUTH", "value": 1, "timestamp": 1700000000.25}
//!
//! ```
//!
//! [`SseDecoder`] turns raw body chunks into complete `data` payloads; the
//! JSON itself is parsed by the stream supervisor so that a malformed payload
//! never tears down the channel.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::Client;
use tracing::{debug, warn};

use crate::error::MonitorError;
use crate::stream::{EventChannel, EventConnector};

/// Path of the backend event stream, relative to the server base URL
pub const EVENTS_PATH: &str = "/api/input/events";

/// Longest incomplete line the decoder will buffer
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Incremental `text/event-stream` decoder
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
    /// Previous line ended in `\r`; a leading `\n` belongs to it
    skip_lf: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a body chunk, returning every payload completed by it.
    ///
    /// Chunks may split lines (and UTF-8 sequences) anywhere. Lines end in
    /// `\r\n`, `\n` or a bare `\r`. Once an unterminated line grows past
    /// [`MAX_LINE_BYTES`] the last item is an error and the buffer is dropped.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Result<String, MonitorError>> {
        self.buffer.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        let mut start = 0;
        loop {
            if self.skip_lf {
                match self.buffer.get(start) {
                    Some(&b'\n') => start += 1,
                    Some(_) => {}
                    None => break,
                }
                self.skip_lf = false;
            }

            let Some(offset) = self.buffer[start..]
                .iter()
                .position(|&b| b == b'\n' || b == b'\r')
            else {
                break;
            };
            let end = start + offset;
            self.skip_lf = self.buffer[end] == b'\r';
            let line = String::from_utf8_lossy(&self.buffer[start..end]).into_owned();
            start = end + 1;

            if let Some(payload) = self.process_line(&line) {
                payloads.push(Ok(payload));
            }
        }
        self.buffer.drain(..start);

        if self.buffer.len() > MAX_LINE_BYTES {
            self.buffer.clear();
            self.data.clear();
            payloads.push(Err(MonitorError::Channel(format!(
                "event stream line exceeds {MAX_LINE_BYTES} bytes"
            ))));
        }

        payloads
    }

    fn process_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            // Blank line dispatches the event
            if self.data.is_empty() {
                return None;
            }
            let payload = self.data.join("\n");
            self.data.clear();
            return Some(payload);
        }

        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        // `event`, `id` and `retry` carry nothing the monitor uses
        if field == "data" {
            self.data.push(value.to_string());
        }
        None
    }
}

/// Opens the backend event stream over HTTP
#[derive(Debug, Clone)]
pub struct HttpEventConnector {
    client: Client,
    url: String,
}

impl HttpEventConnector {
    /// `base_url` is the collaborator's root, e.g. `http://localhost:8080`
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            url: format!("{}{}", base_url.trim_end_matches('/'), EVENTS_PATH),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl EventConnector for HttpEventConnector {
    async fn open(&self) -> Result<EventChannel, MonitorError> {
        debug!("Opening event stream {}", self.url);
        let response = self
            .client
            .get(&self.url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| MonitorError::Channel(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MonitorError::Http {
                status: response.status().as_u16(),
            });
        }

        let mut body = response.bytes_stream();
        let channel = async_stream::stream! {
            let mut decoder = SseDecoder::new();
            'read: while let Some(chunk) = body.next().await {
                match chunk {
                    Ok(chunk) => {
                        for item in decoder.feed(&chunk) {
                            let failed = item.is_err();
                            yield item;
                            if failed {
                                warn!("Event stream line too long, dropping channel");
                                break 'read;
                            }
                        }
                    }
                    Err(e) => {
                        warn!("Event stream read error: {}", e);
                        yield Err(MonitorError::Channel(e.to_string()));
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(channel))
    }
}

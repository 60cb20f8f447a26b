//! Server-sent events decoding for streamed vendor responses

use crate::error::{ProviderError, Result};
use crate::registry::ProviderKind;
use async_stream::try_stream;
use futures::{Stream, StreamExt};

/// One decoded event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Value of the `event:` field, if present
    pub event: Option<String>,
    /// `data:` lines joined with `\n`
    pub data: String,
}

/// Incremental decoder; events may be split across any number of network
/// chunks, including in the middle of a multi-byte character
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes and return every event completed by them
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buf.extend(bytes.iter().copied().filter(|b| *b != b'\r'));

        let mut events = Vec::new();
        while let Some(pos) = find_blank_line(&self.buf) {
            let block: Vec<u8> = self.buf.drain(..pos + 2).collect();
            if let Some(event) = parse_block(&block[..pos]) {
                events.push(event);
            }
        }
        events
    }

    /// Flush a trailing event that was not terminated by a blank line
    pub fn finish(&mut self) -> Option<SseEvent> {
        let block = std::mem::take(&mut self.buf);
        parse_block(&block)
    }
}

fn find_blank_line(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\n\n")
}

fn parse_block(block: &[u8]) -> Option<SseEvent> {
    let text = String::from_utf8_lossy(block);
    let mut event = None;
    let mut data: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event = Some(value.to_string()),
            "data" => data.push(value),
            _ => {}
        }
    }

    if data.is_empty() {
        return None;
    }

    Some(SseEvent {
        event,
        data: data.join("\n"),
    })
}

/// Decode the body of a streaming response into events
pub fn sse_events(
    provider: ProviderKind,
    response: reqwest::Response,
) -> impl Stream<Item = Result<SseEvent>> + Send {
    try_stream! {
        let mut decoder = SseDecoder::new();
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let bytes = chunk.map_err(|e| ProviderError::from_reqwest(provider, e))?;
            tracing::trace!(provider = %provider, bytes = bytes.len(), "stream chunk");
            for event in decoder.push(&bytes) {
                yield event;
            }
        }
        if let Some(event) = decoder.finish() {
            yield event;
        }
    }
}

/// Parse the data of one event as JSON
pub(crate) fn parse_event<T: serde::de::DeserializeOwned>(
    provider: ProviderKind,
    event: &SseEvent,
) -> Result<T> {
    serde_json::from_str(&event.data).map_err(|e| {
        ProviderError::MalformedPayload {
            provider,
            message: format!("{}: {}", e, event.data),
        }
        .into()
    })
}

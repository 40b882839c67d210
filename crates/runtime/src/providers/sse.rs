//! Server-Sent Events decoding shared by the streaming adapters.

use crate::{Error, Result, TextStream};
use async_stream::try_stream;
use futures_core::Stream;
use futures_util::StreamExt;
use std::fmt::Display;
use tracing::{debug, trace};

/// One decoded SSE event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

/// What an adapter wants done with an event.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum SseAction {
    /// Emit a text fragment (dropped if empty).
    Emit(String),
    /// Nothing to emit for this event.
    Skip,
    /// The vendor signalled end of generation.
    Done,
}

/// Incremental decoder. Bytes may split anywhere, including inside a
/// multi-byte character; only complete events are returned.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buf.extend(bytes.iter().copied().filter(|b| *b != b'\r'));
        let mut events = Vec::new();
        while let Some(pos) = self.buf.windows(2).position(|w| w == b"\n\n") {
            let block: Vec<u8> = self.buf.drain(..pos + 2).collect();
            if let Some(event) = parse_block(&String::from_utf8_lossy(&block[..pos])) {
                events.push(event);
            }
        }
        events
    }

    /// Flush a trailing event that was not terminated by a blank line.
    pub fn finish(&mut self) -> Option<SseEvent> {
        let rest = std::mem::take(&mut self.buf);
        parse_block(&String::from_utf8_lossy(&rest))
    }
}

fn parse_block(block: &str) -> Option<SseEvent> {
    let mut event = None;
    let mut data: Vec<&str> = Vec::new();
    for line in block.lines() {
        if line.starts_with(':') {
            continue;
        }
        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "event" => event = Some(value.to_string()),
            "data" => data.push(value),
            _ => {}
        }
    }
    if event.is_none() && data.is_empty() {
        return None;
    }
    Some(SseEvent {
        event,
        data: data.join("\n"),
    })
}

/// Adapt a vendor byte stream into a [`TextStream`], letting `extract`
/// decide what each event means.
pub(crate) fn text_stream<S, B, E, F>(provider: &'static str, body: S, mut extract: F) -> TextStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
    F: FnMut(&SseEvent) -> Result<SseAction> + Send + 'static,
{
    let fragments = try_stream! {
        let mut body = std::pin::pin!(body);
        let mut decoder = SseDecoder::default();
        let mut done = false;
        while !done {
            let Some(chunk) = body.next().await else {
                break;
            };
            let chunk = chunk.map_err(|e| Error::upstream(provider, e))?;
            for event in decoder.push(chunk.as_ref()) {
                trace!(provider, data = %event.data, "sse event");
                match extract(&event)? {
                    SseAction::Emit(text) if !text.is_empty() => {
                        yield text;
                    }
                    SseAction::Emit(_) | SseAction::Skip => {}
                    SseAction::Done => {
                        done = true;
                        break;
                    }
                }
            }
        }
        if !done {
            if let Some(event) = decoder.finish() {
                if let SseAction::Emit(text) = extract(&event)? {
                    if !text.is_empty() {
                        yield text;
                    }
                }
            }
        }
        debug!(provider, "stream finished");
    };
    TextStream::new(provider, fragments)
}

//! Line-oriented decoding of chat completion event streams.
//!
//! Upstream sends `data: {json}` lines terminated by a `data: [DONE]`
//! sentinel. Anything else on the wire is ignored, and frames whose JSON
//! does not parse are dropped without ending the stream.

use std::fmt::Display;
use std::pin::Pin;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tracing::debug;

use crate::providers::{FragmentStream, connection_failed_notice};

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

/// Buffers raw bytes and hands out complete lines.
///
/// Working on bytes rather than decoded text keeps multi-byte characters
/// intact when a network chunk ends in the middle of one.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    pub fn next_line(&mut self) -> Option<String> {
        let pos = self.buf.iter().position(|b| *b == b'\n')?;
        let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Take whatever is left once the transport has closed.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buf);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum SseLine {
    /// A text delta worth forwarding.
    Fragment(String),
    /// End-of-stream sentinel.
    Done,
    /// Blank lines, comments, other fields, bad JSON, empty deltas.
    Skip,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<StreamDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

pub fn classify_line(line: &str) -> SseLine {
    let Some(data) = line.trim().strip_prefix(DATA_PREFIX) else {
        return SseLine::Skip;
    };
    let data = data.trim();
    if data == DONE_SENTINEL {
        return SseLine::Done;
    }

    let chunk: StreamChunk = match serde_json::from_str(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            debug!("skipping malformed stream frame: {e}");
            return SseLine::Skip;
        }
    };

    chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content)
        .filter(|content| !content.is_empty())
        .map_or(SseLine::Skip, SseLine::Fragment)
}

struct DecodeState<S> {
    inner: Pin<Box<S>>,
    lines: LineBuffer,
    closed: bool,
}

/// Turn a body byte stream into text fragments.
///
/// A transport error ends the sequence with a connection notice.
pub fn decode_fragments<S, E>(body: S) -> FragmentStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = DecodeState {
        inner: Box::pin(body),
        lines: LineBuffer::default(),
        closed: false,
    };

    let fragments = futures::stream::unfold(state, |mut state| async move {
        if state.closed {
            return None;
        }

        loop {
            if let Some(line) = state.lines.next_line() {
                match classify_line(&line) {
                    SseLine::Fragment(text) => return Some((text, state)),
                    SseLine::Done => return None,
                    SseLine::Skip => continue,
                }
            }

            match state.inner.next().await {
                Some(Ok(bytes)) => state.lines.push(&bytes),
                Some(Err(e)) => {
                    state.closed = true;
                    return Some((connection_failed_notice(e), state));
                }
                None => {
                    state.closed = true;
                    return match state.lines.finish().as_deref().map(classify_line) {
                        Some(SseLine::Fragment(text)) => Some((text, state)),
                        _ => None,
                    };
                }
            }
        }
    });

    Box::pin(fragments)
}

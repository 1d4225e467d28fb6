//! Streaming relay from the upstream SSE response to the browser
//!
//! Upstream bytes are decoded into events and re-emitted as `Frame`s in
//! arrival order. The transport layer turns frames into `data:` lines.
//!
//! Failure policy:
//! - a payload that is not valid JSON is skipped and forwarding continues
//! - a transport error or an oversized event ends the stream with a
//!   single `Error` frame
//! - a clean end (or upstream `[DONE]`) yields exactly one `End` frame

pub mod sse;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use serde::de::IgnoredAny;
use std::collections::VecDeque;
use std::convert::Infallible;

use crate::error::{ReproduceError, Result};

pub use sse::{DEFAULT_MAX_EVENT_BYTES, SseDecoder, SseEvent};

/// One unit sent to the browser
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Upstream JSON payload, forwarded untouched
    Data(String),
    /// Terminal error; nothing follows it
    Error(String),
    /// Terminal success marker
    End,
}

impl Frame {
    /// Wire encoding as one SSE event
    pub fn encode(&self) -> Bytes {
        match self {
            Frame::Data(payload) => {
                let mut out = String::with_capacity(payload.len() + 8);
                for line in payload.split('\n') {
                    out.push_str("data: ");
                    out.push_str(line);
                    out.push('\n');
                }
                out.push('\n');
                Bytes::from(out)
            }
            Frame::Error(message) => {
                let body = serde_json::json!({ "error": message });
                Bytes::from(format!("data: {body}\n\n"))
            }
            Frame::End => Bytes::from_static(b"data: [DONE]\n\n"),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Frame::Data(_))
    }
}

struct RelayState<S> {
    upstream: S,
    decoder: SseDecoder,
    pending: VecDeque<Frame>,
    finished: bool,
    forwarded: usize,
    skipped: usize,
}

impl<S> RelayState<S> {
    fn accept(&mut self, event: SseEvent) {
        if self.finished {
            return;
        }

        match event {
            SseEvent::Done => self.finish_with(Frame::End),
            SseEvent::Data(payload) => {
                if serde_json::from_str::<IgnoredAny>(&payload).is_ok() {
                    self.forwarded += 1;
                    self.pending.push_back(Frame::Data(payload));
                } else {
                    self.skipped += 1;
                    tracing::warn!(
                        payload_length = payload.len(),
                        "Skipping malformed upstream chunk"
                    );
                }
            }
        }
    }

    fn accept_all(&mut self, events: Vec<SseEvent>) {
        for event in events {
            self.accept(event);
        }
    }

    /// End the relay with an error frame unless it already ended
    fn fail(&mut self, error: ReproduceError) {
        if self.finished {
            return;
        }
        tracing::warn!(error_type = error.category(), "Upstream stream failed: {error}");
        self.finish_with(Frame::Error(error.to_string()));
    }

    fn finish_with(&mut self, frame: Frame) {
        self.pending.push_back(frame);
        self.finished = true;
        tracing::debug!(
            forwarded = self.forwarded,
            skipped = self.skipped,
            "Upstream stream finished"
        );
    }
}

/// Relay an upstream SSE byte stream as frames
///
/// Lazy: nothing is read until the returned stream is polled. Dropping it
/// drops `upstream`, which closes the upstream connection.
pub fn relay<S>(upstream: S) -> impl Stream<Item = Frame> + Send + 'static
where
    S: Stream<Item = Result<Bytes>> + Send + Unpin + 'static,
{
    relay_with_limit(upstream, DEFAULT_MAX_EVENT_BYTES)
}

/// Like `relay`, failing the stream once a single event exceeds `max_event_bytes`
pub fn relay_with_limit<S>(
    upstream: S,
    max_event_bytes: usize,
) -> impl Stream<Item = Frame> + Send + 'static
where
    S: Stream<Item = Result<Bytes>> + Send + Unpin + 'static,
{
    let state = RelayState {
        upstream,
        decoder: SseDecoder::with_max_event_bytes(max_event_bytes),
        pending: VecDeque::new(),
        finished: false,
        forwarded: 0,
        skipped: 0,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(frame) = state.pending.pop_front() {
                return Some((frame, state));
            }
            if state.finished {
                return None;
            }

            match state.upstream.next().await {
                Some(Ok(chunk)) => {
                    let mut events = Vec::new();
                    let pushed = state.decoder.push(&chunk, &mut events);
                    state.accept_all(events);
                    if let Err(e) = pushed {
                        state.fail(e);
                    }
                }
                Some(Err(e)) => state.fail(e),
                None => {
                    let mut events = Vec::new();
                    let flushed = state.decoder.finish(&mut events);
                    state.accept_all(events);
                    if let Err(e) = flushed {
                        state.fail(e);
                    }
                    if !state.finished {
                        state.finish_with(Frame::End);
                    }
                }
            }
        }
    })
}

/// A stream holding a single error frame
pub fn error_frame(message: impl Into<String>) -> impl Stream<Item = Frame> + Send + 'static {
    stream::once(std::future::ready(Frame::Error(message.into())))
}

/// Encode frames into response body chunks
pub fn encode_frames<S>(frames: S) -> impl Stream<Item = std::result::Result<Bytes, Infallible>>
where
    S: Stream<Item = Frame>,
{
    frames.map(|frame| Ok(frame.encode()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstream(chunks: Vec<&'static str>) -> impl Stream<Item = Result<Bytes>> + Send + Unpin {
        stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok(Bytes::from_static(c.as_bytes())))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn test_relay_forwards_in_order_then_done() {
        let frames: Vec<Frame> =
            relay(upstream(vec!["data: {\"a\":1}\n\n", "data: {\"a\":2}\n\n"]))
                .collect()
                .await;

        assert_eq!(
            frames,
            vec![
                Frame::Data(r#"{"a":1}"#.to_string()),
                Frame::Data(r#"{"a":2}"#.to_string()),
                Frame::End,
            ]
        );
    }

    #[tokio::test]
    async fn test_relay_does_not_duplicate_upstream_done() {
        let frames: Vec<Frame> = relay(upstream(vec![
            "data: {\"a\":1}\n\ndata: [DONE]\n\n",
            "data: {\"late\":true}\n\n",
        ]))
        .collect()
        .await;

        assert_eq!(frames, vec![Frame::Data(r#"{"a":1}"#.to_string()), Frame::End]);
    }

    #[tokio::test]
    async fn test_relay_skips_malformed_chunk_and_continues() {
        let frames: Vec<Frame> = relay(upstream(vec![
            "data: {\"a\":1}\n\n",
            "data: {not json\n\n",
            "data: {\"a\":3}\n\n",
        ]))
        .collect()
        .await;

        assert_eq!(
            frames,
            vec![
                Frame::Data(r#"{"a":1}"#.to_string()),
                Frame::Data(r#"{"a":3}"#.to_string()),
                Frame::End,
            ]
        );
    }

    #[tokio::test]
    async fn test_relay_transport_error_is_terminal() {
        let chunks: Vec<Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"data: {\"a\":1}\n\n")),
            Err(ReproduceError::Network("connection reset".to_string())),
            Ok(Bytes::from_static(b"data: {\"a\":2}\n\n")),
        ];

        let frames: Vec<Frame> = relay(stream::iter(chunks)).collect().await;

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], Frame::Data(r#"{"a":1}"#.to_string()));
        assert!(matches!(&frames[1], Frame::Error(m) if m.contains("connection reset")));
    }

    #[tokio::test]
    async fn test_relay_oversized_event_is_terminal() {
        let chunks: Vec<Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"data: {\"a\":1}\n\ndata: {\"b\":\"")),
            Ok(Bytes::from(vec![b'x'; 256])),
            Ok(Bytes::from_static(b"\"}\n\n")),
        ];

        let frames: Vec<Frame> = relay_with_limit(stream::iter(chunks), 128).collect().await;

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], Frame::Data(r#"{"a":1}"#.to_string()));
        assert!(matches!(&frames[1], Frame::Error(m) if m.contains("exceeds 128 bytes")));
    }

    #[tokio::test]
    async fn test_relay_empty_upstream_yields_only_done() {
        let frames: Vec<Frame> = relay(upstream(vec![])).collect().await;
        assert_eq!(frames, vec![Frame::End]);
    }

    #[test]
    fn test_frame_encoding() {
        assert_eq!(
            Frame::Data(r#"{"a":1}"#.to_string()).encode(),
            Bytes::from_static(b"data: {\"a\":1}\n\n")
        );
        assert_eq!(Frame::End.encode(), Bytes::from_static(b"data: [DONE]\n\n"));
        assert_eq!(
            Frame::Error("boom".to_string()).encode(),
            Bytes::from_static(b"data: {\"error\":\"boom\"}\n\n")
        );
    }

    #[test]
    fn test_multiline_payload_keeps_framing() {
        let encoded = Frame::Data("{\"a\":\n1}".to_string()).encode();
        assert_eq!(encoded, Bytes::from_static(b"data: {\"a\":\ndata: 1}\n\n"));
    }

    #[tokio::test]
    async fn test_error_frame_stream() {
        let frames: Vec<Frame> = error_frame("Upstream returned 401: nope").collect().await;
        assert_eq!(frames, vec![Frame::Error("Upstream returned 401: nope".to_string())]);
        assert!(frames[0].is_terminal());
    }
}

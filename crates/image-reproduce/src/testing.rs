//! Test utilities - a scripted in-memory upstream
//!
//! `ScriptedUpstream` answers completions from a queue and streams from a
//! fixed script, recording every request so tests can assert call counts
//! without any network.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{ReproduceError, Result};
use crate::upstream::{ChatRequest, ChatUpstream, UpstreamStream};

enum StreamScript {
    Chunks(Vec<Result<Bytes>>),
    Fail(ReproduceError),
}

/// Fake upstream driven by a script
#[derive(Default)]
pub struct ScriptedUpstream {
    completions: Mutex<VecDeque<Result<Value>>>,
    fallback: Option<Value>,
    stream: Mutex<Option<StreamScript>>,
    calls: AtomicUsize,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful completion
    pub fn then_complete(self, response: Value) -> Self {
        self.push(Ok(response))
    }

    /// Queue a failed completion
    pub fn then_fail(self, error: ReproduceError) -> Self {
        self.push(Err(error))
    }

    /// Response used once the queue is empty
    pub fn otherwise_complete(mut self, response: Value) -> Self {
        self.fallback = Some(response);
        self
    }

    /// Stream these raw chunks on the next `stream_chat`
    pub fn with_stream<I, C>(self, chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Bytes>,
    {
        let chunks = chunks.into_iter().map(|c| Ok(c.into())).collect();
        self.set_stream(StreamScript::Chunks(chunks))
    }

    /// Stream these chunks, then fail with `error`
    pub fn with_broken_stream<I, C>(self, chunks: I, error: ReproduceError) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Bytes>,
    {
        let mut items: Vec<Result<Bytes>> = chunks.into_iter().map(|c| Ok(c.into())).collect();
        items.push(Err(error));
        self.set_stream(StreamScript::Chunks(items))
    }

    /// Fail the next `stream_chat` before any chunk
    pub fn with_stream_failure(self, error: ReproduceError) -> Self {
        self.set_stream(StreamScript::Fail(error))
    }

    /// Number of upstream calls made so far (streaming and not)
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request received, in order
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    fn push(self, item: Result<Value>) -> Self {
        if let Ok(mut queue) = self.completions.lock() {
            queue.push_back(item);
        }
        self
    }

    fn set_stream(self, script: StreamScript) -> Self {
        if let Ok(mut slot) = self.stream.lock() {
            *slot = Some(script);
        }
        self
    }

    fn record(&self, request: &ChatRequest) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
    }
}

#[async_trait]
impl ChatUpstream for ScriptedUpstream {
    async fn stream_chat(&self, request: &ChatRequest) -> Result<UpstreamStream> {
        self.record(request);

        let script = self.stream.lock().ok().and_then(|mut slot| slot.take());
        match script {
            Some(StreamScript::Chunks(chunks)) => Ok(Box::pin(stream::iter(chunks))),
            Some(StreamScript::Fail(error)) => Err(error),
            None => Err(ReproduceError::Network("no scripted stream".to_string())),
        }
    }

    async fn complete_chat(&self, request: &ChatRequest) -> Result<Value> {
        self.record(request);

        let next = self
            .completions
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front());
        match (next, &self.fallback) {
            (Some(item), _) => item,
            (None, Some(fallback)) => Ok(fallback.clone()),
            (None, None) => Err(ReproduceError::Network(
                "no scripted completion".to_string(),
            )),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    fn request() -> ChatRequest {
        ChatRequest::image_generation("m", "p")
    }

    #[tokio::test]
    async fn scripted_completions_follow_queue_then_fallback() {
        let upstream = ScriptedUpstream::new()
            .then_complete(json!({"n": 1}))
            .then_fail(ReproduceError::Timeout("t".to_string()))
            .otherwise_complete(json!({"n": 0}));

        assert_eq!(upstream.complete_chat(&request()).await.unwrap(), json!({"n": 1}));
        assert!(upstream.complete_chat(&request()).await.is_err());
        assert_eq!(upstream.complete_chat(&request()).await.unwrap(), json!({"n": 0}));
        assert_eq!(upstream.calls(), 3);
    }

    #[tokio::test]
    async fn scripted_stream_yields_chunks() {
        let upstream = ScriptedUpstream::new().with_stream(["a", "b"]);

        let chunks: Vec<Bytes> = upstream
            .stream_chat(&request())
            .await
            .unwrap()
            .map(|c| c.unwrap())
            .collect()
            .await;

        assert_eq!(chunks, vec![Bytes::from("a"), Bytes::from("b")]);
        assert_eq!(upstream.requests().len(), 1);
    }
}

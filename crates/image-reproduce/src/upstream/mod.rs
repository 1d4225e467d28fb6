//! Upstream chat-completions client
//!
//! One trait, two backends:
//! - `StructuredClient` sends typed requests and decodes typed completions
//! - `RawClient` assembles JSON by hand and returns the body untouched
//!
//! Both share `HttpTransport`, which owns the credential check, the
//! per-call timeout and status handling.

mod raw;
mod structured;
mod transport;
pub mod types;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde_json::Value;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{UpstreamBackend, UpstreamSettings};
use crate::error::{ReproduceError, Result};

pub use raw::RawClient;
pub use structured::StructuredClient;
pub use transport::HttpTransport;
pub use types::{ChatCompletion, ChatMessage, ChatRequest, ContentPart, ImageUrl, MessageContent, Role};

/// Raw byte stream of an upstream Server-Sent-Events response
pub type UpstreamStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// A chat-completions backend
#[async_trait]
pub trait ChatUpstream: Send + Sync {
    /// Open a streaming completion; resolves once the upstream answered with 2xx
    async fn stream_chat(&self, request: &ChatRequest) -> Result<UpstreamStream>;

    /// Run a non-streaming completion and return the response JSON
    async fn complete_chat(&self, request: &ChatRequest) -> Result<Value>;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}

/// Build the HTTP client shared by every upstream call
///
/// No overall timeout here: streaming responses may outlive it. Per-call
/// ceilings are applied by the transport.
pub fn build_http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| ReproduceError::Configuration(format!("Failed to create HTTP client: {e}")))
}

/// Construct the backend selected in the settings
pub fn connect(settings: UpstreamSettings, client: reqwest::Client) -> Result<Arc<dyn ChatUpstream>> {
    let backend = settings.backend;
    let transport = HttpTransport::new(client, settings)?;

    let upstream: Arc<dyn ChatUpstream> = match backend {
        UpstreamBackend::Structured => Arc::new(StructuredClient::new(transport)),
        UpstreamBackend::Raw => Arc::new(RawClient::new(transport)),
    };

    tracing::info!("Using {} upstream backend", upstream.name());
    Ok(upstream)
}

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

use super::transport::HttpTransport;
use super::types::{ChatCompletion, ChatRequest};
use super::{ChatUpstream, UpstreamStream};

/// Backend working with typed request and response models
#[derive(Debug, Clone)]
pub struct StructuredClient {
    transport: HttpTransport,
}

impl StructuredClient {
    pub fn new(transport: HttpTransport) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl ChatUpstream for StructuredClient {
    async fn stream_chat(&self, request: &ChatRequest) -> Result<UpstreamStream> {
        let request = ChatRequest {
            stream: true,
            ..request.clone()
        };
        self.transport.open_stream(&request).await
    }

    async fn complete_chat(&self, request: &ChatRequest) -> Result<Value> {
        let request = ChatRequest {
            stream: false,
            ..request.clone()
        };
        let body = self.transport.complete(&request).await?;

        let completion: ChatCompletion = serde_json::from_value(body)?;
        tracing::debug!(
            id = completion.id.as_deref().unwrap_or("-"),
            choices = completion.choices.len(),
            "Decoded completion"
        );

        Ok(serde_json::to_value(completion)?)
    }

    fn name(&self) -> &'static str {
        "structured"
    }
}

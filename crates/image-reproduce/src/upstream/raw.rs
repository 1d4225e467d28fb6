use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::Result;

use super::transport::HttpTransport;
use super::types::{ChatRequest, ContentPart, MessageContent};
use super::{ChatUpstream, UpstreamStream};

/// Backend that speaks plain JSON with no response schema
#[derive(Debug, Clone)]
pub struct RawClient {
    transport: HttpTransport,
}

impl RawClient {
    pub fn new(transport: HttpTransport) -> Self {
        Self { transport }
    }
}

/// Assemble the request body by hand
fn request_body(request: &ChatRequest, stream: bool) -> Value {
    let messages: Vec<Value> = request
        .messages
        .iter()
        .map(|message| {
            let content = match &message.content {
                MessageContent::Text(text) => Value::String(text.clone()),
                MessageContent::Parts(parts) => Value::Array(
                    parts
                        .iter()
                        .map(|part| match part {
                            ContentPart::Text { text } => json!({"type": "text", "text": text}),
                            ContentPart::ImageUrl { image_url } => {
                                json!({"type": "image_url", "image_url": {"url": image_url.url}})
                            }
                        })
                        .collect(),
                ),
            };
            json!({"role": message.role.as_str(), "content": content})
        })
        .collect();

    let mut body = json!({
        "model": request.model,
        "messages": messages,
        "stream": stream,
    });
    if let Some(ref modalities) = request.modalities {
        body["modalities"] = json!(modalities);
    }
    body
}

#[async_trait]
impl ChatUpstream for RawClient {
    async fn stream_chat(&self, request: &ChatRequest) -> Result<UpstreamStream> {
        self.transport.open_stream(&request_body(request, true)).await
    }

    async fn complete_chat(&self, request: &ChatRequest) -> Result<Value> {
        self.transport.complete(&request_body(request, false)).await
    }

    fn name(&self) -> &'static str {
        "raw"
    }
}

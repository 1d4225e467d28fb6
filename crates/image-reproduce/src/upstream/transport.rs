use futures::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::config::UpstreamSettings;
use crate::error::{ReproduceError, Result};

use super::UpstreamStream;

/// HTTP plumbing shared by both upstream backends
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    endpoint: Url,
    settings: UpstreamSettings,
}

impl HttpTransport {
    pub fn new(client: Client, settings: UpstreamSettings) -> Result<Self> {
        let endpoint = settings.chat_completions_url()?;
        Ok(Self {
            client,
            endpoint,
            settings,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Build an authenticated POST; fails before any I/O without a credential
    fn request<B: Serialize + ?Sized>(&self, body: &B) -> Result<RequestBuilder> {
        let api_key = self.settings.require_api_key()?;

        let mut builder = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(api_key)
            .json(body);

        if let Some(ref title) = self.settings.app_title {
            builder = builder.header("X-Title", title);
        }
        if let Some(ref url) = self.settings.app_url {
            builder = builder.header("HTTP-Referer", url);
        }

        Ok(builder)
    }

    /// POST and decode the whole JSON body within the timeout
    pub async fn complete<B: Serialize + ?Sized>(&self, body: &B) -> Result<Value> {
        let request = self.request(body)?.timeout(self.settings.timeout);
        tracing::debug!("Calling upstream completion at {}", self.endpoint);

        let response = check_status(request.send().await?).await?;
        let value: Value = response.json().await?;
        reject_error_payload(&value)?;
        Ok(value)
    }

    /// POST and hand back the body as a byte stream
    ///
    /// The timeout covers waiting for the response head only.
    pub async fn open_stream<B: Serialize + ?Sized>(&self, body: &B) -> Result<UpstreamStream> {
        let request = self.request(body)?.header(ACCEPT, "text/event-stream");
        tracing::debug!("Opening upstream stream at {}", self.endpoint);

        let response = tokio::time::timeout(self.settings.timeout, request.send())
            .await
            .map_err(|_| {
                ReproduceError::Timeout(format!(
                    "no response within {}s",
                    self.settings.timeout.as_secs()
                ))
            })??;
        let response = check_status(response).await?;

        Ok(Box::pin(
            response
                .bytes_stream()
                .map(|chunk| chunk.map_err(ReproduceError::from)),
        ))
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<no body>".to_string());
    tracing::warn!(status = %status, body_length = body.len(), "Upstream returned error");

    Err(ReproduceError::Upstream {
        status: status.as_u16(),
        body,
    })
}

/// OpenRouter may answer 200 with an error object instead of a completion
///
/// The error sits either at the top level (no `choices`) or on the first
/// choice, usually alongside `finish_reason: "error"` and no `message`.
fn reject_error_payload(value: &Value) -> Result<()> {
    let error = match value.get("choices") {
        Some(choices) => choices.get(0).and_then(|choice| choice.get("error")),
        None => value.get("error"),
    };
    let Some(error) = error.filter(|e| e.is_object()) else {
        return Ok(());
    };

    let status = error
        .get("code")
        .and_then(Value::as_u64)
        .and_then(|code| u16::try_from(code).ok())
        .unwrap_or(502);
    let body = error
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string());

    Err(ReproduceError::Upstream { status, body })
}

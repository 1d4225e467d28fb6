use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;

use crate::error::{ReproduceError, Result};

const DEFAULT_MIME: &str = "image/jpeg";

/// Encode raw image bytes as `data:<mime>;base64,<payload>`
pub fn to_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", BASE64.encode(bytes))
}

/// Download a placeholder image and return it as a data URI
pub async fn fetch_random_image(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<String> {
    tracing::debug!("Fetching random image from {url}");

    let response = client.get(url).timeout(timeout).send().await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ReproduceError::Upstream {
            status: status.as_u16(),
            body,
        });
    }

    let mime = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_MIME)
        .to_string();

    let bytes = response.bytes().await?;
    tracing::debug!(mime = %mime, size = bytes.len(), "Random image fetched");

    Ok(to_data_uri(&mime, &bytes))
}

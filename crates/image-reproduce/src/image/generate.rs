//! Bounded retry controller for image generation
//!
//! Attempts run back to back, never concurrently and without backoff.
//! Each attempt ends in one of: image found (done), or a recorded last
//! error and another attempt. Running out of attempts surfaces the last
//! error. A configuration error is returned at once.

use std::sync::Arc;

use crate::error::{ReproduceError, Result};
use crate::upstream::{ChatRequest, ChatUpstream};

use super::extract::{ExtractedImage, extract_image_url};

/// Last error recorded when a completion carries no image
pub const NO_IMAGE_FOUND: &str = "No image found in response";

/// Last error recorded when an attempt timed out
pub const REQUEST_TIMEOUT: &str = "Request timeout";

pub struct ImageGenerator {
    upstream: Arc<dyn ChatUpstream>,
    max_retries: u32,
}

impl ImageGenerator {
    pub fn new(upstream: Arc<dyn ChatUpstream>, max_retries: u32) -> Self {
        Self {
            upstream,
            max_retries: max_retries.max(1),
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Generate an image for `prompt` with `model`
    pub async fn generate(&self, model: &str, prompt: &str) -> Result<ExtractedImage> {
        let request = ChatRequest::image_generation(model, prompt);
        let mut last_error = String::new();

        for attempt in 1..=self.max_retries {
            tracing::debug!(attempt, max_retries = self.max_retries, model, "Requesting image");

            last_error = match self.upstream.complete_chat(&request).await {
                Ok(response) => match extract_image_url(&response) {
                    Some(url) => {
                        tracing::info!(attempt, "Image generated");
                        return Ok(ExtractedImage { url });
                    }
                    None => NO_IMAGE_FOUND.to_string(),
                },
                Err(e) if !e.is_retryable() => return Err(e),
                Err(ReproduceError::Timeout(_)) => REQUEST_TIMEOUT.to_string(),
                Err(e) => e.to_string(),
            };

            tracing::warn!(
                "Image generation attempt {}/{} failed: {}",
                attempt,
                self.max_retries,
                last_error
            );
        }

        Err(ReproduceError::GenerationFailed(last_error))
    }
}

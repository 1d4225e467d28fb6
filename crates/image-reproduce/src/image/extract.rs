//! Locating the generated image inside a completion
//!
//! Providers disagree on where images go. Gemini-style responses carry a
//! dedicated `message.images` list; others put `image_url` parts in
//! `message.content`. Both are accepted, `images` first.

use serde::Serialize;
use serde_json::Value;

/// An image reference pulled out of a completion (data URI or remote URL)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedImage {
    pub url: String,
}

/// Find the image URL in a chat completion response, if any
pub fn extract_image_url(response: &Value) -> Option<String> {
    let message = response
        .get("choices")?
        .as_array()?
        .first()?
        .get("message")?;

    if let Some(images) = message.get("images").and_then(Value::as_array) {
        let mut sorted: Vec<&Value> = images.iter().collect();
        // sort_by is stable: equal indexes keep their original order
        sorted.sort_by(|a, b| image_index(a).total_cmp(&image_index(b)));

        if let Some(url) = sorted.into_iter().find_map(image_entry_url) {
            return Some(url);
        }
    }

    message
        .get("content")
        .and_then(Value::as_array)?
        .iter()
        .find_map(image_entry_url)
}

fn image_index(entry: &Value) -> f64 {
    entry.get("index").and_then(Value::as_f64).unwrap_or(0.0)
}

fn image_entry_url(entry: &Value) -> Option<String> {
    if entry.get("type")?.as_str()? != "image_url" {
        return None;
    }

    let url = entry.get("image_url")?.get("url")?.as_str()?;
    if url.is_empty() {
        None
    } else {
        Some(url.to_string())
    }
}

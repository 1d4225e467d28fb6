use serde::{Deserialize, Serialize};

/// Body of `POST /api/analyze`
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeRequest {
    /// Image as a data URI
    pub image: String,
    /// Falls back to the configured analysis model
    #[serde(default)]
    pub model: Option<String>,
    pub system_prompt: String,
    pub user_prompt: String,
}

/// Body of `POST /api/generate`
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    /// Falls back to the configured generation model
    #[serde(default)]
    pub model: Option<String>,
}

/// `{image}` response of the generate and random-image endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageResponse {
    /// Data URI or remote URL
    pub image: String,
}

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ReproduceError, Result};

/// A selectable model: upstream identifier plus display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    pub name: String,
}

/// Models offered to the UI, split by role
///
/// Registry file format:
/// ```toml
/// [[mllm_models]]
/// id = "google/gemini-3-pro-preview"
/// name = "Gemini 3 Pro"
///
/// [[generation_models]]
/// id = "google/gemini-3-pro-image-preview"
/// name = "Gemini 3 Pro Image"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRegistry {
    /// Multimodal models used for image analysis
    #[serde(default)]
    pub mllm_models: Vec<ModelDescriptor>,
    /// Models able to produce images
    #[serde(default)]
    pub generation_models: Vec<ModelDescriptor>,
}

impl ModelRegistry {
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| ReproduceError::Configuration(format!("Invalid model registry: {e}")))
    }
}

/// Load the model registry from disk
pub async fn load_models(path: &Path) -> Result<ModelRegistry> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!("Model registry missing: {}", path.display());
            return Err(ReproduceError::NotFound(format!(
                "Model registry {} not found",
                path.display()
            )));
        }
        Err(e) => return Err(ReproduceError::Io(e)),
    };

    let registry = ModelRegistry::from_toml(&content)?;
    tracing::debug!(
        "Loaded {} analysis and {} generation models",
        registry.mllm_models.len(),
        registry.generation_models.len()
    );
    Ok(registry)
}

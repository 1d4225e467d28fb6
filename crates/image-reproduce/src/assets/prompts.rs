use serde::Serialize;
use std::path::Path;

use crate::error::{ReproduceError, Result};

/// Template name of the default analysis system prompt
pub const SYSTEM_PROMPT: &str = "vlm_system";

/// Template name of the default analysis user prompt
pub const USER_PROMPT: &str = "vlm_user";

/// Default prompt templates served to the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptPair {
    pub system_prompt: String,
    pub user_prompt: String,
}

/// Load `<dir>/<name>.md` verbatim
pub async fn load_prompt(dir: &Path, name: &str) -> Result<String> {
    let file_name = format!("{name}.md");
    let path = dir.join(&file_name);

    match tokio::fs::read_to_string(&path).await {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!("Prompt template missing: {}", path.display());
            Err(ReproduceError::NotFound(format!(
                "Prompt file {file_name} not found"
            )))
        }
        Err(e) => Err(ReproduceError::Io(e)),
    }
}

/// Load the default system and user prompts
pub async fn load_prompt_pair(dir: &Path) -> Result<PromptPair> {
    Ok(PromptPair {
        system_prompt: load_prompt(dir, SYSTEM_PROMPT).await?,
        user_prompt: load_prompt(dir, USER_PROMPT).await?,
    })
}

//! Read-only assets loaded from disk on every request
//!
//! Prompt templates live as `<name>.md` files in a directory, the model
//! registry is a TOML file. Nothing here is cached.

pub mod models;
pub mod prompts;

pub use models::{ModelDescriptor, ModelRegistry, load_models};
pub use prompts::{PromptPair, SYSTEM_PROMPT, USER_PROMPT, load_prompt, load_prompt_pair};

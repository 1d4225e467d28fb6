use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::error::{ReproduceError, Result};

/// Main configuration structure for the service
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Upstream LLM API configuration
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// Prompt template and model registry locations
    #[serde(default)]
    pub assets: AssetsConfig,
    /// Image analysis defaults
    #[serde(default)]
    pub analysis: AnalysisConfig,
    /// Image generation defaults
    #[serde(default)]
    pub generation: GenerationConfig,
    /// Placeholder image source
    #[serde(default)]
    pub random_image: RandomImageConfig,
}

impl Config {
    /// Parse a configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| ReproduceError::Configuration(format!("Failed to parse config: {e}")))
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "127.0.0.1:8000")
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Directory served for every path not handled by the API
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            static_dir: default_static_dir(),
        }
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

/// Which upstream client implementation to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UpstreamBackend {
    /// Typed request and response models
    #[default]
    Structured,
    /// Untyped JSON in, JSON out
    Raw,
}

/// Upstream chat-completions API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Environment variable holding the bearer token
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Per-call timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Client implementation
    #[serde(default)]
    pub backend: UpstreamBackend,
    /// Sent as `X-Title` for OpenRouter attribution
    #[serde(default)]
    pub app_title: Option<String>,
    /// Sent as `HTTP-Referer` for OpenRouter attribution
    #[serde(default)]
    pub app_url: Option<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            backend: UpstreamBackend::default(),
            app_title: None,
            app_url: None,
        }
    }
}

fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

/// Locations of the prompt templates and the model registry
#[derive(Debug, Clone, Deserialize)]
pub struct AssetsConfig {
    /// Directory containing `<name>.md` prompt templates
    #[serde(default = "default_prompts_dir")]
    pub prompts_dir: PathBuf,
    /// TOML model registry
    #[serde(default = "default_models_file")]
    pub models_file: PathBuf,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            prompts_dir: default_prompts_dir(),
            models_file: default_models_file(),
        }
    }
}

fn default_prompts_dir() -> PathBuf {
    PathBuf::from("prompts")
}

fn default_models_file() -> PathBuf {
    PathBuf::from("models.toml")
}

/// Image analysis configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    /// Model used when a request omits one
    #[serde(default = "default_analysis_model")]
    pub default_model: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            default_model: default_analysis_model(),
        }
    }
}

pub(crate) fn default_analysis_model() -> String {
    "google/gemini-3-pro-preview".to_string()
}

/// Image generation configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    /// Model used when a request omits one
    #[serde(default = "default_generation_model")]
    pub default_model: String,
    /// Maximum sequential attempts per generate request
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            default_model: default_generation_model(),
            max_retries: default_max_retries(),
        }
    }
}

pub(crate) fn default_generation_model() -> String {
    "google/gemini-3-pro-image-preview".to_string()
}

fn default_max_retries() -> u32 {
    3
}

/// Placeholder image service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RandomImageConfig {
    /// URL returning a random image
    #[serde(default = "default_random_image_url")]
    pub url: String,
}

impl Default for RandomImageConfig {
    fn default() -> Self {
        Self {
            url: default_random_image_url(),
        }
    }
}

fn default_random_image_url() -> String {
    "https://picsum.photos/800/600".to_string()
}

/// Upstream settings resolved once at process start
///
/// Holds the credential explicitly so nothing reads the environment per request.
/// `Debug` output never includes the credential itself.
#[derive(Clone)]
pub struct UpstreamSettings {
    pub base_url: Url,
    pub api_key: Option<String>,
    pub api_key_env: String,
    pub timeout: Duration,
    pub backend: UpstreamBackend,
    pub app_title: Option<String>,
    pub app_url: Option<String>,
}

impl fmt::Debug for UpstreamSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamSettings")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &self.api_key.as_ref().map(|_| "[redacted]"))
            .field("api_key_env", &self.api_key_env)
            .field("timeout", &self.timeout)
            .field("backend", &self.backend)
            .field("app_title", &self.app_title)
            .field("app_url", &self.app_url)
            .finish()
    }
}

impl UpstreamSettings {
    /// Resolve settings from config, reading the credential from the process environment
    pub fn from_config(config: &UpstreamConfig) -> Result<Self> {
        Self::from_config_with(config, |name| std::env::var(name).ok())
    }

    /// Resolve settings using a custom variable lookup
    pub fn from_config_with(
        config: &UpstreamConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            ReproduceError::Configuration(format!(
                "Invalid upstream base URL '{}': {e}",
                config.base_url
            ))
        })?;

        let api_key = lookup(&config.api_key_env).filter(|key| !key.trim().is_empty());
        if api_key.is_none() {
            tracing::warn!(
                "{} is not set; analyze and generate requests will fail",
                config.api_key_env
            );
        }

        Ok(Self {
            base_url,
            api_key,
            api_key_env: config.api_key_env.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            backend: config.backend,
            app_title: config.app_title.clone(),
            app_url: config.app_url.clone(),
        })
    }

    /// Settings pointing at `base_url` with an explicit credential
    pub fn new(base_url: Url, api_key: Option<String>) -> Self {
        let defaults = UpstreamConfig::default();
        Self {
            base_url,
            api_key,
            api_key_env: defaults.api_key_env,
            timeout: Duration::from_secs(defaults.timeout_secs),
            backend: defaults.backend,
            app_title: None,
            app_url: None,
        }
    }

    /// The credential, or a configuration error naming the missing variable
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ReproduceError::Configuration(format!("{} not set", self.api_key_env)))
    }

    /// Full URL of the chat completions endpoint
    pub fn chat_completions_url(&self) -> Result<Url> {
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join("chat/completions").map_err(|e| {
            ReproduceError::Configuration(format!("Invalid chat completions URL: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.listen_addr, "127.0.0.1:8000");
        assert_eq!(config.upstream.base_url, "https://openrouter.ai/api/v1");
        assert_eq!(config.upstream.api_key_env, "OPENROUTER_API_KEY");
        assert_eq!(config.upstream.timeout_secs, 120);
        assert_eq!(config.upstream.backend, UpstreamBackend::Structured);
        assert_eq!(config.generation.max_retries, 3);
        assert_eq!(config.assets.prompts_dir, PathBuf::from("prompts"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = Config::from_toml(
            r#"
[server]
listen_addr = "0.0.0.0:8000"

[upstream]
backend = "raw"
timeout_secs = 30
"#,
        )
        .unwrap();

        assert_eq!(config.server.listen_addr, "0.0.0.0:8000");
        assert_eq!(config.server.static_dir, PathBuf::from("static"));
        assert_eq!(config.upstream.backend, UpstreamBackend::Raw);
        assert_eq!(config.upstream.timeout_secs, 30);
        assert_eq!(config.upstream.api_key_env, "OPENROUTER_API_KEY");
        assert_eq!(config.generation.default_model, "google/gemini-3-pro-image-preview");
    }

    #[test]
    fn test_invalid_toml_is_configuration_error() {
        let err = Config::from_toml("[upstream]\nbackend = \"grpc\"").unwrap_err();
        assert!(matches!(err, ReproduceError::Configuration(_)));
    }

    #[test]
    fn test_settings_resolve_key_from_lookup() {
        let settings = UpstreamSettings::from_config_with(&UpstreamConfig::default(), |name| {
            (name == "OPENROUTER_API_KEY").then(|| "sk-test".to_string())
        })
        .unwrap();

        assert_eq!(settings.require_api_key().unwrap(), "sk-test");
        assert_eq!(settings.timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_settings_missing_key() {
        let settings =
            UpstreamSettings::from_config_with(&UpstreamConfig::default(), |_| None).unwrap();

        let err = settings.require_api_key().unwrap_err();
        assert!(matches!(err, ReproduceError::Configuration(_)));
        assert_eq!(err.to_string(), "OPENROUTER_API_KEY not set");
    }

    #[test]
    fn test_settings_blank_key_counts_as_missing() {
        let settings = UpstreamSettings::from_config_with(&UpstreamConfig::default(), |_| {
            Some("   ".to_string())
        })
        .unwrap();
        assert!(settings.api_key.is_none());
    }

    #[test]
    fn test_debug_output_redacts_api_key() {
        let settings = UpstreamSettings::new(
            Url::parse("https://openrouter.ai/api/v1").unwrap(),
            Some("sk-or-secret-123".to_string()),
        );

        let debug = format!("{settings:?}");
        assert!(!debug.contains("sk-or-secret-123"));
        assert!(debug.contains("[redacted]"));
        assert!(debug.contains("OPENROUTER_API_KEY"));

        let missing = UpstreamSettings::new(Url::parse("http://127.0.0.1:9000").unwrap(), None);
        assert!(format!("{missing:?}").contains("api_key: None"));
    }

    #[test]
    fn test_chat_completions_url_keeps_base_path() {
        let settings = UpstreamSettings::new(
            Url::parse("https://openrouter.ai/api/v1").unwrap(),
            None,
        );
        assert_eq!(
            settings.chat_completions_url().unwrap().as_str(),
            "https://openrouter.ai/api/v1/chat/completions"
        );

        let settings = UpstreamSettings::new(Url::parse("http://127.0.0.1:9000/").unwrap(), None);
        assert_eq!(
            settings.chat_completions_url().unwrap().as_str(),
            "http://127.0.0.1:9000/chat/completions"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let config = UpstreamConfig {
            base_url: "not a url".to_string(),
            ..UpstreamConfig::default()
        };
        let err = UpstreamSettings::from_config_with(&config, |_| None).unwrap_err();
        assert!(matches!(err, ReproduceError::Configuration(_)));
    }
}

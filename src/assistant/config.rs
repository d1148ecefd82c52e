//! Assistant configuration.

use super::prompt::PromptConfig;
use crate::error::{Error, Result};
use crate::tools::{DEFAULT_OUTPUT_PATH, ToolsConfig};
use std::path::PathBuf;

/// Default chat completions endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Configuration for the research assistant.
///
/// Built once at startup and handed to the assistant; nothing downstream
/// reads the environment on its own.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// The model to use (e.g., "llama-3.1-8b-instant", "llama-3.3-70b-versatile")
    pub model: String,
    /// Temperature for LLM sampling
    pub temperature: Option<f32>,
    /// Maximum tokens for LLM response
    pub max_tokens: Option<u32>,
    /// API key for the model endpoint
    pub api_key: String,
    /// Base URL of the OpenAI-compatible endpoint
    pub base_url: String,
    /// Timeout applied to every external call
    pub timeout_secs: u64,
    /// Result limits for the context sources
    pub tools: ToolsConfig,
    /// Shape of the requested summary
    pub prompt: PromptConfig,
    /// Where saved research goes
    pub output_path: PathBuf,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            model: "llama-3.1-8b-instant".to_string(),
            temperature: Some(0.7),
            max_tokens: Some(4000),
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 60,
            tools: ToolsConfig::default(),
            prompt: PromptConfig::default(),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
        }
    }
}

impl AssistantConfig {
    /// Create a new config with the specified model.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Read the config from `GROQ_API_KEY`, `GROQ_MODEL` and `GROQ_BASE_URL`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = lookup("GROQ_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::Config("GROQ_API_KEY is not set".to_string()))?;

        let mut config = Self::default().api_key(api_key);
        if let Some(model) = lookup("GROQ_MODEL").filter(|m| !m.trim().is_empty()) {
            config.model = model;
        }
        if let Some(url) = lookup("GROQ_BASE_URL").filter(|u| !u.trim().is_empty()) {
            config.base_url = url;
        }
        Ok(config)
    }

    /// Set the model.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the temperature.
    pub fn temperature(mut self, t: f32) -> Self {
        self.temperature = Some(t);
        self
    }

    /// Set the max tokens.
    pub fn max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = Some(n);
        self
    }

    /// Remove the max tokens limit (let the model use its default).
    pub fn no_max_tokens(mut self) -> Self {
        self.max_tokens = None;
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = key.into();
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn tools(mut self, tools: ToolsConfig) -> Self {
        self.tools = tools;
        self
    }

    pub fn prompt(mut self, prompt: PromptConfig) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }
}

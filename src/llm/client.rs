//! Model Service client abstractions
//!
//! The research pipeline only needs plain text generation from a model; the
//! provider behind it is selected by an opaque `"<provider>__<model>"` string
//! (see [`ModelSelector`]).

use crate::types::{AppError, Result};
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;

/// Generic LLM client trait for provider abstraction
///
/// All providers implement this trait so pipeline stages can be written
/// against any of them (or against a scripted client in tests).
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Generate a completion from a prompt
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Generate with system prompt
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String>;

    /// Get the model name/identifier
    fn model_name(&self) -> &str;
}

/// Parsed `platformModel` selector, e.g. `openai__gpt-4o-mini`
///
/// The provider part names a `[providers.<name>]` block in the configuration;
/// the model part is passed through to that provider untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelSelector {
    pub provider: String,
    pub model: String,
}

impl ModelSelector {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        s.parse()
    }
}

impl FromStr for ModelSelector {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once("__") {
            Some((provider, model)) if !provider.is_empty() && !model.is_empty() => {
                Ok(Self::new(provider, model))
            }
            _ => Err(AppError::InvalidInput(format!(
                "Invalid model selector '{}': expected '<provider>__<model>'",
                s
            ))),
        }
    }
}

impl fmt::Display for ModelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}__{}", self.provider, self.model)
    }
}

/// Provider enum for runtime selection
#[derive(Debug, Clone)]
pub enum Provider {
    /// OpenAI API provider (including OpenRouter, Groq and other compatible APIs)
    ///
    /// # Example
    /// ```rust,ignore
    /// let provider = Provider::OpenAI {
    ///     api_key: "sk-...".to_string(),
    ///     api_base: "https://api.openai.com/v1".to_string(),
    ///     model: "gpt-4o-mini".to_string(),
    /// };
    /// ```
    OpenAI {
        api_key: String,
        api_base: String,
        model: String,
    },

    /// Ollama local LLM provider
    Ollama { base_url: String, model: String },
}

impl Provider {
    /// Create a client instance for this provider
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Configuration`] when the provider was compiled out.
    pub fn create_client(&self) -> Result<Box<dyn LLMClient>> {
        match self {
            #[cfg(feature = "openai")]
            Provider::OpenAI {
                api_key,
                api_base,
                model,
            } => Ok(Box::new(super::openai::OpenAIClient::new(
                api_key.clone(),
                api_base.clone(),
                model.clone(),
            ))),

            #[cfg(feature = "ollama")]
            Provider::Ollama { base_url, model } => Ok(Box::new(
                super::ollama::OllamaClient::new(base_url.clone(), model.clone()),
            )),

            #[allow(unreachable_patterns)]
            other => Err(AppError::Configuration(format!(
                "{} support is not enabled in this build",
                other.name()
            ))),
        }
    }

    /// Get a human-readable name for this provider
    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAI { .. } => "OpenAI",
            Provider::Ollama { .. } => "Ollama",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_parse() {
        let selector = ModelSelector::parse("openai__gpt-4o-mini").unwrap();
        assert_eq!(selector.provider, "openai");
        assert_eq!(selector.model, "gpt-4o-mini");
        assert_eq!(selector.to_string(), "openai__gpt-4o-mini");
    }

    #[test]
    fn test_selector_splits_on_first_separator() {
        let selector = ModelSelector::parse("openrouter__meta__llama-3").unwrap();
        assert_eq!(selector.provider, "openrouter");
        assert_eq!(selector.model, "meta__llama-3");
    }

    #[test]
    fn test_selector_rejects_malformed() {
        assert!(ModelSelector::parse("gpt-4o").is_err());
        assert!(ModelSelector::parse("__gpt-4o").is_err());
        assert!(ModelSelector::parse("openai__").is_err());
    }

    #[test]
    fn test_provider_name() {
        let openai = Provider::OpenAI {
            api_key: "".to_string(),
            api_base: "".to_string(),
            model: "".to_string(),
        };
        assert_eq!(openai.name(), "OpenAI");

        let ollama = Provider::Ollama {
            base_url: "".to_string(),
            model: "".to_string(),
        };
        assert_eq!(ollama.name(), "Ollama");
    }

    #[cfg(feature = "ollama")]
    #[test]
    fn test_ollama_client_reports_model() {
        let provider = Provider::Ollama {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.2".to_string(),
        };
        let client = provider.create_client().unwrap();
        assert_eq!(client.model_name(), "llama3.2");
    }
}

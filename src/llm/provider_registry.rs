//! Provider Registry resolving `provider__model` selectors to clients
//!
//! The registry holds the `[providers.*]` blocks from `research.toml` and
//! turns a [`ModelSelector`] into a ready-to-use [`LLMClient`].

use crate::llm::client::{LLMClient, ModelSelector, Provider};
use crate::types::{AppError, Result};
use crate::utils::toml_config::{ProviderConfig, ResearchConfig};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry for managing multiple named LLM providers
pub struct ProviderRegistry {
    /// Provider configurations keyed by name
    providers: HashMap<String, ProviderConfig>,
    /// Selector used when the caller does not name one
    default_selector: Option<ModelSelector>,
}

impl ProviderRegistry {
    /// Create a new empty provider registry
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
            default_selector: None,
        }
    }

    /// Create a provider registry from TOML configuration
    pub fn from_config(config: &ResearchConfig) -> Self {
        Self {
            providers: config.providers.clone(),
            default_selector: config.platform_model().ok(),
        }
    }

    /// Register a provider configuration
    pub fn register_provider(&mut self, name: &str, config: ProviderConfig) {
        self.providers.insert(name.to_string(), config);
    }

    pub fn set_default(&mut self, selector: ModelSelector) {
        self.default_selector = Some(selector);
    }

    pub fn default_selector(&self) -> Option<&ModelSelector> {
        self.default_selector.as_ref()
    }

    /// Get all provider names, sorted
    pub fn provider_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Build the concrete [`Provider`] for a selector
    pub fn resolve(&self, selector: &ModelSelector) -> Result<Provider> {
        let provider_config = self.providers.get(&selector.provider).ok_or_else(|| {
            AppError::Configuration(format!(
                "Provider '{}' not found in configuration",
                selector.provider
            ))
        })?;

        match provider_config {
            ProviderConfig::OpenAI {
                api_key_env,
                api_base,
            } => {
                let api_key = std::env::var(api_key_env).map_err(|_| {
                    AppError::Configuration(format!(
                        "API key for provider '{}' missing: set {}",
                        selector.provider, api_key_env
                    ))
                })?;
                Ok(Provider::OpenAI {
                    api_key,
                    api_base: api_base.clone(),
                    model: selector.model.clone(),
                })
            }
            ProviderConfig::Ollama { base_url } => Ok(Provider::Ollama {
                base_url: base_url.clone(),
                model: selector.model.clone(),
            }),
        }
    }

    /// Create an LLM client for a selector
    pub fn client_for(&self, selector: &ModelSelector) -> Result<Arc<dyn LLMClient>> {
        let provider = self.resolve(selector)?;
        tracing::debug!(selector = %selector, provider = provider.name(), "Creating model client");
        Ok(Arc::from(provider.create_client()?))
    }

    /// Create an LLM client for the configured default selector
    pub fn default_client(&self) -> Result<Arc<dyn LLMClient>> {
        let selector = self
            .default_selector
            .as_ref()
            .ok_or_else(|| AppError::Configuration("No default platform model configured".into()))?;
        self.client_for(selector)
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_default_config() {
        let registry = ProviderRegistry::from_config(&ResearchConfig::default());
        assert_eq!(registry.provider_names(), vec!["ollama", "openai"]);
        assert_eq!(
            registry.default_selector(),
            Some(&ModelSelector::new("openai", "gpt-4o-mini"))
        );
    }

    #[test]
    fn test_resolve_ollama() {
        let registry = ProviderRegistry::from_config(&ResearchConfig::default());
        let provider = registry
            .resolve(&ModelSelector::new("ollama", "qwen2.5"))
            .unwrap();
        match provider {
            Provider::Ollama { base_url, model } => {
                assert_eq!(base_url, "http://localhost:11434");
                assert_eq!(model, "qwen2.5");
            }
            _ => panic!("Expected Ollama provider"),
        }
    }

    #[test]
    fn test_resolve_unknown_provider() {
        let registry = ProviderRegistry::new();
        let err = registry
            .resolve(&ModelSelector::new("mystery", "m"))
            .unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }

    #[test]
    fn test_missing_api_key_is_configuration_error() {
        let mut registry = ProviderRegistry::new();
        registry.register_provider(
            "keyless",
            ProviderConfig::OpenAI {
                api_key_env: "ARES_RESEARCH_TEST_UNSET_KEY".to_string(),
                api_base: "https://example.invalid/v1".to_string(),
            },
        );
        let err = registry
            .resolve(&ModelSelector::new("keyless", "gpt"))
            .unwrap_err();
        assert!(err.to_string().contains("ARES_RESEARCH_TEST_UNSET_KEY"));
    }
}

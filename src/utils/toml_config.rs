//! TOML-based configuration for the research engine
//!
//! This module provides declarative configuration for model providers,
//! search backends, pipeline limits, retry policy, storage and logging via a
//! TOML file (`research.toml`). Every field has a default, so an empty file
//! (or no file at all, see [`ResearchConfig::load_or_default`]) is valid.
//!
//! Use [`ConfigManager`] for thread-safe access to the current configuration
//! and to re-read it from disk.

use crate::llm::client::ModelSelector;
use crate::retry::RetryPolicy;
use crate::types::{AppError, SearchProviderKind, TimeFilter};
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Root configuration structure loaded from research.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    #[serde(default)]
    pub research: PipelineConfig,

    #[serde(default)]
    pub retry: RetryPolicy,

    /// Named Model Service providers, addressed by the provider half of a
    /// `provider__model` selector
    #[serde(default = "default_providers")]
    pub providers: HashMap<String, ProviderConfig>,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            research: PipelineConfig::default(),
            retry: RetryPolicy::default(),
            providers: default_providers(),
            search: SearchConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

// ============= Pipeline Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Default `provider__model` selector for every model-backed stage
    #[serde(default = "default_platform_model")]
    pub platform_model: String,

    /// Maximum number of sources the diversity selector accepts
    #[serde(default = "default_max_sources")]
    pub max_sources: usize,

    /// Scores must be strictly greater than this to be selected
    #[serde(default = "default_min_score")]
    pub min_score: f32,

    #[serde(default)]
    pub time_filter: TimeFilter,

    #[serde(default)]
    pub search_provider: SearchProviderKind,

    /// Upper bound on extracted page text passed to synthesis
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,
}

fn default_platform_model() -> String {
    "openai__gpt-4o-mini".to_string()
}

fn default_max_sources() -> usize {
    3
}

fn default_min_score() -> f32 {
    0.5
}

fn default_max_content_chars() -> usize {
    20_000
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            platform_model: default_platform_model(),
            max_sources: default_max_sources(),
            min_score: default_min_score(),
            time_filter: TimeFilter::default(),
            search_provider: SearchProviderKind::default(),
            max_content_chars: default_max_content_chars(),
        }
    }
}

// ============= Provider Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    Ollama {
        #[serde(default = "default_ollama_url")]
        base_url: String,
    },
    OpenAI {
        /// Environment variable containing API key
        api_key_env: String,
        #[serde(default = "default_openai_base")]
        api_base: String,
    },
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_openai_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_providers() -> HashMap<String, ProviderConfig> {
    let mut providers = HashMap::new();
    providers.insert(
        "openai".to_string(),
        ProviderConfig::OpenAI {
            api_key_env: "OPENAI_API_KEY".to_string(),
            api_base: default_openai_base(),
        },
    );
    providers.insert(
        "ollama".to_string(),
        ProviderConfig::Ollama {
            base_url: default_ollama_url(),
        },
    );
    providers
}

// ============= Search Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Number of results requested from the provider
    #[serde(default = "default_num_results")]
    pub num_results: usize,

    /// Bing-compatible web search endpoint (optional)
    pub bing: Option<BingConfig>,
}

fn default_num_results() -> usize {
    10
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            num_results: default_num_results(),
            bing: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BingConfig {
    #[serde(default = "default_bing_endpoint")]
    pub endpoint: String,

    /// Environment variable containing the subscription key
    #[serde(default = "default_bing_key_env")]
    pub api_key_env: String,
}

fn default_bing_endpoint() -> String {
    "https://api.bing.microsoft.com/v7.0/search".to_string()
}

fn default_bing_key_env() -> String {
    "AZURE_SUB_KEY".to_string()
}

// ============= Storage Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_projects_dir")]
    pub projects_dir: PathBuf,

    /// Quiet period before a changed project is written to disk
    #[serde(default = "default_save_debounce_ms")]
    pub save_debounce_ms: u64,
}

fn default_projects_dir() -> PathBuf {
    PathBuf::from("./data/projects")
}

fn default_save_debounce_ms() -> u64 {
    1000
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            projects_dir: default_projects_dir(),
            save_debounce_ms: default_save_debounce_ms(),
        }
    }
}

// ============= Logging Configuration =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

// ============= Configuration Loading & Validation =============

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),

    #[error("Provider '{0}' referenced by platform model '{1}' does not exist")]
    MissingProvider(String, String),
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

impl ResearchConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;

        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Like [`ResearchConfig::load`], but a missing file yields the defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        match Self::load(path) {
            Err(ConfigError::FileNotFound(path)) => {
                info!(path = %path.display(), "No configuration file, using defaults");
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Parse and validate configuration text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: ResearchConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.research.max_sources == 0 {
            return Err(ConfigError::ValidationError(
                "research.max_sources must be at least 1".to_string(),
            ));
        }

        if !(0.0..1.0).contains(&self.research.min_score) {
            return Err(ConfigError::ValidationError(format!(
                "research.min_score must be in [0, 1), got {}",
                self.research.min_score
            )));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }

        let selector = self.platform_model()?;
        if !self.providers.contains_key(&selector.provider) {
            return Err(ConfigError::MissingProvider(
                selector.provider,
                self.research.platform_model.clone(),
            ));
        }

        if self.research.search_provider == SearchProviderKind::Bing && self.search.bing.is_none()
        {
            return Err(ConfigError::ValidationError(
                "search_provider is 'bing' but no [search.bing] block is configured".to_string(),
            ));
        }

        Ok(())
    }

    /// The default platform model as a parsed selector
    pub fn platform_model(&self) -> Result<ModelSelector, ConfigError> {
        ModelSelector::parse(&self.research.platform_model)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))
    }

    /// Resolve an environment variable by name
    pub fn resolve_env(&self, env_name: &str) -> Option<String> {
        std::env::var(env_name).ok()
    }

    /// Resolve an environment variable, failing when it is unset
    pub fn require_env(&self, env_name: &str) -> Result<String, ConfigError> {
        self.resolve_env(env_name)
            .ok_or_else(|| ConfigError::MissingEnvVar(env_name.to_string()))
    }

    pub fn get_provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }
}

// ============= Configuration Manager =============

/// Thread-safe configuration holder with on-demand reloading
pub struct ConfigManager {
    config: Arc<ArcSwap<ResearchConfig>>,
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new configuration manager and load the initial config.
    /// A missing file falls back to the defaults.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let config = ResearchConfig::load_or_default(&path)?;

        Ok(Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            config_path: path,
        })
    }

    /// Create a config manager directly from a config (useful for testing)
    pub fn from_config(config: ResearchConfig) -> Self {
        Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            config_path: PathBuf::from("research.toml"),
        }
    }

    /// Get the current configuration (lockless read)
    pub fn config(&self) -> Arc<ResearchConfig> {
        self.config.load_full()
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Re-read the configuration from disk. On failure the previous
    /// configuration stays active.
    pub fn reload(&self) -> Result<(), ConfigError> {
        info!("Reloading configuration from {:?}", self.config_path);

        let new_config = ResearchConfig::load(&self.config_path)?;
        self.config.store(Arc::new(new_config));

        info!("Configuration reloaded successfully");
        Ok(())
    }
}

impl Clone for ConfigManager {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            config_path: self.config_path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_config() -> String {
        r#"
[research]
platform_model = "local__llama3.2"
max_sources = 4
min_score = 0.6
time_filter = "week"
search_provider = "bing"

[retry]
max_attempts = 5
base_delay_ms = 250

[providers.local]
type = "ollama"
base_url = "http://localhost:11434"

[providers.openrouter]
type = "openai"
api_key_env = "OPENROUTER_API_KEY"
api_base = "https://openrouter.ai/api/v1"

[search]
num_results = 8

[search.bing]
api_key_env = "BING_KEY"

[storage]
projects_dir = "/tmp/projects"
save_debounce_ms = 200

[logging]
level = "debug"
format = "json"
"#
        .to_string()
    }

    #[test]
    fn test_parse_full_config() {
        let config = ResearchConfig::from_toml(&create_test_config()).unwrap();

        assert_eq!(config.research.max_sources, 4);
        assert_eq!(config.research.min_score, 0.6);
        assert_eq!(config.research.time_filter, TimeFilter::Week);
        assert_eq!(config.research.search_provider, SearchProviderKind::Bing);
        assert_eq!(config.retry, RetryPolicy::new(5, 250));
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.search.num_results, 8);
        assert_eq!(
            config.search.bing.as_ref().unwrap().endpoint,
            "https://api.bing.microsoft.com/v7.0/search"
        );
        assert_eq!(config.storage.save_debounce_ms, 200);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(
            config.platform_model().unwrap(),
            ModelSelector::new("local", "llama3.2")
        );
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = ResearchConfig::from_toml("").unwrap();

        assert_eq!(config.research.max_sources, 3);
        assert_eq!(config.research.min_score, 0.5);
        assert_eq!(config.retry, RetryPolicy::default());
        assert!(config.get_provider("openai").is_some());
        assert!(config.get_provider("ollama").is_some());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let err = ResearchConfig::from_toml(
            r#"
[research]
platform_model = "anthropic__claude"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingProvider(ref p, _) if p == "anthropic"));
    }

    #[test]
    fn test_invalid_limits_rejected() {
        assert!(ResearchConfig::from_toml("[research]\nmax_sources = 0\n").is_err());
        assert!(ResearchConfig::from_toml("[research]\nmin_score = 1.0\n").is_err());
        assert!(ResearchConfig::from_toml("[retry]\nmax_attempts = 0\n").is_err());
    }

    #[test]
    fn test_bing_requires_block() {
        let err = ResearchConfig::from_toml("[research]\nsearch_provider = \"bing\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_manager_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("research.toml");
        fs::write(&path, "[research]\nmax_sources = 2\n").unwrap();

        let manager = ConfigManager::new(&path).unwrap();
        assert_eq!(manager.config().research.max_sources, 2);

        fs::write(&path, "[research]\nmax_sources = 5\n").unwrap();
        manager.reload().unwrap();
        assert_eq!(manager.config().research.max_sources, 5);

        fs::write(&path, "[research]\nmax_sources = 0\n").unwrap();
        assert!(manager.reload().is_err());
        assert_eq!(manager.config().research.max_sources, 5);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::new(dir.path().join("absent.toml")).unwrap();
        assert_eq!(manager.config().research.max_sources, 3);
    }
}

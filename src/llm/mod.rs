//! Model Service clients
//!
//! Every model-backed pipeline stage talks to an [`LLMClient`]. Which
//! provider answers is decided by a [`ModelSelector`] (`"<provider>__<model>"`)
//! resolved through the [`ProviderRegistry`] against the `[providers.*]`
//! blocks of `research.toml`.
//!
//! # Supported Providers
//!
//! Enable providers via Cargo features:
//! - `openai` - OpenAI API and compatible endpoints
//! - `ollama` - Local Ollama server

/// Core LLM client trait, provider enum and model selector.
pub mod client;
/// Registry resolving selectors against configured providers.
pub mod provider_registry;

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "openai")]
pub mod openai;

pub use client::{LLMClient, ModelSelector, Provider};
pub use provider_registry::ProviderRegistry;

//! # A.R.E.S Research Graph
//!
//! Multi-round, branchable AI-assisted web research. A research round runs
//! the stages optimize → search → rank → select → fetch → synthesize →
//! follow-up, and every stage is recorded as a node of a persistent
//! research graph. Reports can be branched into new rounds from their
//! follow-up terms and consolidated into combined reports.
//!
//! ## Overview
//!
//! The crate can be used in two ways:
//!
//! 1. **As a command line tool** - Run the `ares-research` binary
//! 2. **As a library** - Drive a [`ResearchGraphManager`] from your own code
//!
//! ### Basic Example
//!
//! ```rust,ignore
//! use ares_research::{ProviderRegistry, ResearchConfig, ResearchGraphManager, ResearchServices};
//! use ares_research::graph::RoundOptions;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> ares_research::Result<()> {
//!     let config = ResearchConfig::load_or_default("research.toml")?;
//!     let llm = ProviderRegistry::from_config(&config).default_client()?;
//!     let services = Arc::new(ResearchServices::from_config(&config, llm)?);
//!
//!     let manager = ResearchGraphManager::new(services);
//!     let (_round, report) = manager
//!         .run_round("rust async runtimes", None, RoundOptions::from_config(&config.research))
//!         .await?;
//!     println!("report node: {}", report.report);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `openai` | OpenAI API and compatible endpoints (default) |
//! | `ollama` | Ollama local inference (default) |
//! | `duckduckgo` | DuckDuckGo search via daedra (default) |
//!
//! ## Modules
//!
//! - [`graph`] - Research graph: nodes, reducer, manager, consolidation
//! - [`research`] - Pipeline stages
//! - [`project`] - Projects, storage and debounced persistence
//! - [`llm`] - Model Service clients
//! - [`retry`] - Rate-limit retry with exponential backoff
//! - [`types`] - Common types and error handling
//! - [`utils`] - TOML configuration

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

/// Command line interface.
pub mod cli;
/// Research graph state, manager and consolidation.
pub mod graph;
/// Model Service clients and provider registry.
pub mod llm;
/// Projects and their persistence.
pub mod project;
/// Research pipeline stages.
pub mod research;
/// Retry policy for remote calls.
pub mod retry;
/// Core types and errors.
pub mod types;
/// Configuration utilities.
pub mod utils;

pub use graph::{GraphState, Intent, ResearchGraphManager};
pub use llm::{LLMClient, Provider, ProviderRegistry};
pub use project::{FileProjectStore, Project, ProjectStore};
pub use research::ResearchServices;
pub use retry::RetryPolicy;
pub use types::{AppError, Result};
pub use utils::toml_config::{ConfigManager, ResearchConfig};

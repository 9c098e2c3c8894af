//! Init command implementation
//!
//! Scaffolds a research workspace: `research.toml`, `.env.example`, the
//! project data directory and a `.gitignore`.

use super::output::Output;
use std::fs;
use std::path::Path;

/// Result of the init operation
pub enum InitResult {
    /// Initialization completed successfully
    Success,
    /// research.toml found and --force not given
    AlreadyExists,
    /// An error occurred during initialization
    Error(String),
}

/// Configuration for the init command
pub struct InitConfig {
    /// Directory to initialize
    pub path: std::path::PathBuf,
    /// Overwrite existing files
    pub force: bool,
    /// Model provider to configure (openai, ollama, or both)
    pub provider: String,
}

/// Run the init command
pub fn run(config: InitConfig, output: &Output) -> InitResult {
    output.banner();
    output.header("Initializing research workspace");

    let base_path = &config.path;

    let config_path = base_path.join("research.toml");
    if config_path.exists() && !config.force {
        output.warning("research.toml already exists!");
        output.hint("Use --force to overwrite existing files");
        return InitResult::AlreadyExists;
    }

    output.subheader("Creating directories");

    for dir in ["data", "data/projects"] {
        let dir_path = base_path.join(dir);
        if !dir_path.exists() {
            if let Err(e) = fs::create_dir_all(&dir_path) {
                output.error(&format!("Failed to create {}: {}", dir, e));
                return InitResult::Error(e.to_string());
            }
            output.created_dir(dir);
        } else {
            output.skipped(dir, "already exists");
        }
    }

    output.subheader("Creating configuration files");

    let toml_content = generate_research_toml(&config);
    if let Err(e) = write_file(&config_path, &toml_content, config.force) {
        output.error(&format!("Failed to create research.toml: {}", e));
        return InitResult::Error(e.to_string());
    }
    output.created("config", "research.toml");

    let env_example_path = base_path.join(".env.example");
    if let Err(e) = write_file(&env_example_path, &generate_env_example(), config.force) {
        output.error(&format!("Failed to create .env.example: {}", e));
        return InitResult::Error(e.to_string());
    }
    output.created("env", ".env.example");

    let gitignore_path = base_path.join(".gitignore");
    if !gitignore_path.exists() {
        if let Err(e) = write_file(&gitignore_path, &generate_gitignore(), false) {
            output.warning(&format!("Failed to create .gitignore: {}", e));
        } else {
            output.created("file", ".gitignore");
        }
    }

    output.complete("Research workspace initialized!");

    output.header("Next Steps");
    output.newline();
    if config.provider == "ollama" {
        output.info("1. Start Ollama (if not running):");
        output.command("ollama serve");
        output.command("ollama pull llama3.2  # or your preferred model");
    } else {
        output.info("1. Set up environment variables:");
        output.command("cp .env.example .env");
        output.command("# Edit .env and set OPENAI_API_KEY");
    }
    output.newline();

    output.info("2. Try an offline round, then a real one:");
    output.command("ares-research research test --test");
    output.command("ares-research research \"your topic\"");

    output.hint("Projects are saved under ./data/projects");

    InitResult::Success
}

fn write_file(path: &Path, content: &str, force: bool) -> std::io::Result<()> {
    if path.exists() && !force {
        return Ok(());
    }
    fs::write(path, content)
}

fn generate_research_toml(config: &InitConfig) -> String {
    let provider_section = match config.provider.as_str() {
        "ollama" => {
            r#"# Ollama - Local inference (no API key required)
[providers.ollama]
type = "ollama"
base_url = "http://localhost:11434"
"#
        }
        "both" => {
            r#"# OpenAI API (set OPENAI_API_KEY in .env)
[providers.openai]
type = "openai"
api_key_env = "OPENAI_API_KEY"
api_base = "https://api.openai.com/v1"

# Ollama - Local inference
[providers.ollama]
type = "ollama"
base_url = "http://localhost:11434"
"#
        }
        _ => {
            r#"# OpenAI API (set OPENAI_API_KEY in .env)
[providers.openai]
type = "openai"
api_key_env = "OPENAI_API_KEY"
api_base = "https://api.openai.com/v1"
"#
        }
    };

    let platform_model = if config.provider == "ollama" {
        "ollama__llama3.2"
    } else {
        "openai__gpt-4o-mini"
    };

    format!(
        r#"# Research Graph Configuration
# ============================
# Generated by: ares-research init

# =============================================================================
# Pipeline
# =============================================================================
[research]
# "<provider>__<model>"; the provider names a [providers.*] block below
platform_model = "{platform_model}"
max_sources = 3
# Sources must score strictly above this to be selected
min_score = 0.5
# 24h, week, month, year or all
time_filter = "all"
# duckduckgo or bing
search_provider = "duckduckgo"
max_content_chars = 20000

# =============================================================================
# Retry (rate-limited calls only)
# =============================================================================
[retry]
max_attempts = 3
base_delay_ms = 1000

# =============================================================================
# Model Service Providers
# =============================================================================
{provider_section}
# =============================================================================
# Search
# =============================================================================
[search]
num_results = 10

# Uncomment to enable Bing (set AZURE_SUB_KEY in .env)
# [search.bing]
# endpoint = "https://api.bing.microsoft.com/v7.0/search"
# api_key_env = "AZURE_SUB_KEY"

# =============================================================================
# Storage
# =============================================================================
[storage]
projects_dir = "./data/projects"
save_debounce_ms = 1000

# =============================================================================
# Logging (RUST_LOG takes precedence)
# =============================================================================
[logging]
level = "info"
# pretty or json
format = "pretty"
"#
    )
}

fn generate_env_example() -> String {
    r#"# Model Service
OPENAI_API_KEY=

# Bing web search (only with [search.bing])
AZURE_SUB_KEY=

# Log filter, overrides [logging].level
# RUST_LOG=ares_research=debug
"#
    .to_string()
}

fn generate_gitignore() -> String {
    r#"# Research projects
/data/

# Environment
.env

# Build
/target/

# OS
.DS_Store
"#
    .to_string()
}

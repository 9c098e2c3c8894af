/// TOML configuration for the research engine.
pub mod toml_config;

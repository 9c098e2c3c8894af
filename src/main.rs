use anyhow::Context;
use ares_research::cli::{commands, output::Output, Cli};
use ares_research::utils::toml_config::{ConfigManager, LogFormat, LoggingConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    let config_manager = ConfigManager::new(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    let config = config_manager.config();

    init_tracing(&config.logging, cli.verbose)?;
    tracing::debug!(path = %config_manager.path().display(), "Configuration ready");

    if let Err(e) = commands::run(cli, &config, &output).await {
        output.error(&e.to_string());
        std::process::exit(1);
    }
    Ok(())
}

/// RUST_LOG wins, then --verbose, then `[logging].level`. Logs go to stderr
/// so command output stays pipeable.
fn init_tracing(logging: &LoggingConfig, verbose: bool) -> anyhow::Result<()> {
    let fallback = if verbose {
        "ares_research=debug".to_string()
    } else {
        logging.level.clone()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let registry = tracing_subscriber::registry().with(filter);
    let result = match logging.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };
    result.map_err(|e| anyhow::anyhow!("failed to initialize tracing subscriber: {e}"))
}

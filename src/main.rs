use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use instagram_media_scraper::cli::Cli;
use instagram_media_scraper::config::Config;
use instagram_media_scraper::scraper;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    init_tracing()?;

    let cli = Cli::parse();

    // Usage errors are reported before any network activity or output file
    // is touched.
    cli.validate()?;
    let accounts = cli.resolve_accounts()?;

    let config = Config::from_cli(&cli).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    info!(
        accounts = accounts.len(),
        destination = %config.destination_root.display(),
        output = %config.output_path.display(),
        "Starting scrape batch"
    );

    let summary = scraper::run_batch(&config, &accounts).await?;

    info!(
        accounts_scraped = summary.accounts_scraped,
        accounts_unavailable = summary.accounts_unavailable,
        rows = summary.rows_written,
        downloaded = summary.downloads_completed,
        skipped = summary.downloads_skipped,
        failed = summary.downloads_failed,
        "Batch complete"
    );

    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,instagram_media_scraper=debug"));

    // Check if JSON logging is requested
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    if use_json {
        // Structured JSON logging for production
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        // Pretty-printed logging for development
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use reader_epub_archiver::archive_book;
use reader_epub_archiver::config::Config;
use reader_epub_archiver::reader::{ChromiumSession, SiteProfile};

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

    info!("Starting reader-epub-archiver");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    info!(
        book_id = %config.book_id,
        site_url = %config.site_url,
        temp_dir = %config.temp_dir.display(),
        books_dir = %config.books_dir.display(),
        "Configuration loaded"
    );

    let profile = SiteProfile::live(&config.site_url, &config.locale);
    let session = ChromiumSession::launch(&config, profile)
        .await
        .context("Failed to launch browser")?;

    let output = archive_book(&config, session)
        .await
        .with_context(|| format!("Failed to archive book {}", config.book_id))?;

    info!(path = %output.display(), "Done");
    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,reader_epub_archiver=debug"));

    // Check if JSON logging is requested
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    if use_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}

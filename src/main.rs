// ABOUTME: Entry point for postgres-bulk-loader
// ABOUTME: Loads configuration, then recreates the target schema and copies every table

use postgres_bulk_loader::commands;
use postgres_bulk_loader::config::LoaderConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging - default to INFO level if RUST_LOG not set
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = LoaderConfig::load()?;
    tracing::info!(
        "Loading {} into {} on {}",
        config.sqlite_path,
        config.target.database,
        config.target.server
    );

    let report = commands::migrate(&config).await?;
    if !report.is_success() {
        tracing::warn!("Load incomplete; pages committed before the failure were kept");
    }

    Ok(())
}

// ABOUTME: Full-refresh migrate command: reset the target schema, then load every table
// ABOUTME: Owns both connections for the duration of the run and releases them on return

use anyhow::{Context, Result};

use crate::config::LoaderConfig;
use crate::migration::{self, MigrationReport};
use crate::postgres::{self, PostgresTarget};
use crate::schema::{sales_schema, Schema};
use crate::sqlite;
use crate::target::TargetWriter;

/// Run the whole load described by `config`
///
/// Connection and schema failures are returned as errors. A failure inside
/// the transfer loop is not: it is logged and carried in the report, with
/// every page committed before it left in place.
///
/// # Examples
///
/// ```no_run
/// # use anyhow::Result;
/// # use postgres_bulk_loader::{commands, config::LoaderConfig};
/// # async fn example() -> Result<()> {
/// let config = LoaderConfig::load()?;
/// let report = commands::migrate(&config).await?;
/// println!("{} rows inserted", report.rows_inserted());
/// # Ok(())
/// # }
/// ```
pub async fn migrate(config: &LoaderConfig) -> Result<MigrationReport> {
    let schema = Schema::new(sales_schema().tables().to_vec())?;

    tracing::info!("Step 1/3: Opening source database...");
    let source = sqlite::open_sqlite(&config.sqlite_path)
        .context("Failed to open SQLite source database")?;

    tracing::info!("Step 2/3: Connecting to target and recreating tables...");
    let client = postgres::connect(&config.target.connection_url())
        .await
        .context("Failed to connect to target PostgreSQL database")?;
    let mut target = PostgresTarget::new(client);
    target.reset_schema(&schema).await?;

    tracing::info!(
        "Step 3/3: Transferring data in pages of {} rows...",
        config.batch_size
    );
    let report = migration::transfer_all(&source, &mut target, &schema, config.batch_size).await;
    report.log_summary();

    Ok(report)
}

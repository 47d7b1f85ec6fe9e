// ABOUTME: Per-table and whole-run results of a bulk load
// ABOUTME: Aggregates row counts and timings and renders the closing summary

use std::time::Duration;

/// Outcome of transferring one table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableReport {
    /// Target table name
    pub table: String,
    pub rows_read: u64,
    pub rows_inserted: u64,
    /// Rows dropped because their primary or unique key already existed
    pub rows_skipped: u64,
    /// Committed pages
    pub pages: u64,
    pub duration: Duration,
    /// False when the transfer stopped inside this table
    pub completed: bool,
}

impl TableReport {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            ..Self::default()
        }
    }
}

/// Outcome of a whole run
///
/// A transfer failure does not make the run an `Err`: it is recorded in
/// `failure` and every page committed before it stays in the target.
#[derive(Debug, Default)]
pub struct MigrationReport {
    pub tables: Vec<TableReport>,
    /// Source tables with no counterpart in the target schema
    pub skipped_tables: Vec<String>,
    pub duration: Duration,
    pub failure: Option<anyhow::Error>,
}

impl MigrationReport {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    pub fn table(&self, name: &str) -> Option<&TableReport> {
        self.tables
            .iter()
            .find(|t| t.table.eq_ignore_ascii_case(name))
    }

    pub fn rows_inserted(&self) -> u64 {
        self.tables.iter().map(|t| t.rows_inserted).sum()
    }

    pub fn rows_skipped(&self) -> u64 {
        self.tables.iter().map(|t| t.rows_skipped).sum()
    }

    /// Emit the closing summary through tracing
    pub fn log_summary(&self) {
        for table in &self.tables {
            let status = if table.completed { "✓" } else { "✗" };
            tracing::info!(
                "  {} {}: {} inserted, {} skipped, {} page(s), {}",
                status,
                table.table,
                table.rows_inserted,
                table.rows_skipped,
                table.pages,
                format_duration(table.duration)
            );
        }

        if !self.skipped_tables.is_empty() {
            tracing::info!(
                "  Ignored source tables: {}",
                self.skipped_tables.join(", ")
            );
        }

        match &self.failure {
            Some(err) => tracing::error!(
                "Migration stopped early after {}: {:#}",
                format_duration(self.duration),
                err
            ),
            None => tracing::info!(
                "Total Migration Time: {} ({} rows inserted, {} skipped)",
                format_duration(self.duration),
                self.rows_inserted(),
                self.rows_skipped()
            ),
        }
    }
}

/// Format a duration for progress lines
///
/// Seconds keep two decimals; longer runs switch to minutes or hours.
///
/// # Examples
///
/// ```
/// # use std::time::Duration;
/// # use postgres_bulk_loader::migration::format_duration;
/// assert_eq!(format_duration(Duration::from_millis(1500)), "1.50 sec");
/// assert_eq!(format_duration(Duration::from_secs(150)), "2.5 min");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();

    if secs < 60.0 {
        format!("{:.2} sec", secs)
    } else if secs < 3600.0 {
        format!("{:.1} min", secs / 60.0)
    } else {
        format!("{:.1} hours", secs / 3600.0)
    }
}

// ABOUTME: SQLite database reading utilities for migration to PostgreSQL
// ABOUTME: Provides secure file path validation and read-only database connections

pub mod converter;
pub mod reader;

use anyhow::{bail, Context, Result};
use std::path::PathBuf;

use crate::error::MigrationError;

/// Validate a SQLite file path before opening it
///
/// Checks:
/// - Canonicalizes path to resolve symlinks and relative paths
/// - Verifies file exists and is a regular file (not directory)
/// - Checks file extension is .db, .sqlite, or .sqlite3
///
/// # Examples
///
/// ```no_run
/// # use postgres_bulk_loader::sqlite::validate_sqlite_path;
/// assert!(validate_sqlite_path("project2normalized.db").is_ok());
/// assert!(validate_sqlite_path("../../../etc/passwd").is_err());
/// ```
pub fn validate_sqlite_path(path: &str) -> Result<PathBuf> {
    if path.is_empty() {
        bail!("SQLite file path cannot be empty");
    }

    let path_buf = PathBuf::from(path);

    // Canonicalize also validates that the file exists
    let canonical = path_buf.canonicalize().with_context(|| {
        format!(
            "Failed to resolve SQLite file path '{}'. \
             File may not exist or may not be readable.",
            path
        )
    })?;

    if !canonical.is_file() {
        bail!("Path '{}' is not a regular file (may be a directory)", path);
    }

    match canonical.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ["db", "sqlite", "sqlite3"].contains(&ext) => {}
        Some(ext) => bail!(
            "Invalid SQLite file extension '{}'. \
             Must be .db, .sqlite, or .sqlite3",
            ext
        ),
        None => bail!(
            "SQLite file '{}' has no extension. \
             Must be .db, .sqlite, or .sqlite3",
            path
        ),
    }

    tracing::debug!("Validated SQLite path: {}", canonical.display());

    Ok(canonical)
}

/// Open a SQLite database in read-only mode
///
/// The path is validated first and the connection is checked with a trivial
/// query so a corrupt file fails here rather than mid-transfer. Failures are
/// reported as [`MigrationError::Connection`].
///
/// # Examples
///
/// ```no_run
/// # use postgres_bulk_loader::sqlite::open_sqlite;
/// # fn example() -> anyhow::Result<()> {
/// let conn = open_sqlite("project2normalized.db")?;
/// # Ok(())
/// # }
/// ```
pub fn open_sqlite(path: &str) -> Result<rusqlite::Connection> {
    let canonical = validate_sqlite_path(path).map_err(|e| MigrationError::Connection {
        store: "source",
        message: format!("{:#}", e),
    })?;

    tracing::info!("Opening SQLite database: {}", canonical.display());

    let conn = rusqlite::Connection::open_with_flags(
        &canonical,
        rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
    )
    .map_err(|e| MigrationError::Connection {
        store: "source",
        message: format!("{}: {}", canonical.display(), e),
    })?;

    let version: String = conn
        .query_row("SELECT sqlite_version()", [], |row| row.get(0))
        .context("Failed to query SQLite version (database may be corrupted)")?;

    tracing::debug!("Opened SQLite database (SQLite {})", version);

    Ok(conn)
}

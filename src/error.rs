// ABOUTME: Error taxonomy for the bulk loader
// ABOUTME: Classifies PostgreSQL driver errors into constraint, write, and connection failures

use thiserror::Error;
use tokio_postgres::error::SqlState;

/// Failure classes raised while loading the target database
///
/// Duplicate-key conflicts are deliberately absent: they are reported as
/// skipped rows in a [`crate::target::PageOutcome`], never as errors.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Failed to connect to {store} database: {message}")]
    Connection {
        store: &'static str,
        message: String,
    },

    #[error("Schema initialization failed: {0}")]
    Schema(String),

    #[error("Constraint violation in table '{table}'{}: {source}", constraint_suffix(.constraint))]
    ConstraintViolation {
        table: String,
        constraint: Option<String>,
        #[source]
        source: tokio_postgres::Error,
    },

    #[error("Failed to read table '{table}' from source")]
    Read {
        table: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Invalid value in {table}.{column}: {message}")]
    InvalidValue {
        table: String,
        column: String,
        message: String,
    },

    #[error("Failed to write to table '{table}'")]
    Write {
        table: String,
        #[source]
        source: tokio_postgres::Error,
    },
}

fn constraint_suffix(constraint: &Option<String>) -> String {
    match constraint {
        Some(name) => format!(" ({})", name),
        None => String::new(),
    }
}

/// Returns true for SQLSTATE codes that indicate a violated integrity constraint
/// other than a plain duplicate key
pub fn is_constraint_violation(code: &SqlState) -> bool {
    *code == SqlState::FOREIGN_KEY_VIOLATION
        || *code == SqlState::NOT_NULL_VIOLATION
        || *code == SqlState::CHECK_VIOLATION
        || *code == SqlState::EXCLUSION_VIOLATION
        || *code == SqlState::INTEGRITY_CONSTRAINT_VIOLATION
}

/// Classify a driver error raised while inserting into `table`
pub fn classify_write_error(table: &str, err: tokio_postgres::Error) -> MigrationError {
    let is_constraint = err.code().map(is_constraint_violation).unwrap_or(false);

    if is_constraint {
        let constraint = err
            .as_db_error()
            .and_then(|db| db.constraint())
            .map(str::to_string);
        MigrationError::ConstraintViolation {
            table: table.to_string(),
            constraint,
            source: err,
        }
    } else {
        MigrationError::Write {
            table: table.to_string(),
            source: err,
        }
    }
}

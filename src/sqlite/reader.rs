// ABOUTME: SQLite catalog introspection and paged row reading
// ABOUTME: Lists tables, counts rows, and streams a table through a forward-only cursor

use anyhow::{Context, Result};
use rusqlite::types::Value;
use rusqlite::{Connection, Rows, Statement};

use crate::utils::validate_postgres_identifier;

/// List all user tables in a SQLite database, in catalog order
///
/// Queries the sqlite_master catalog and excludes SQLite's own `sqlite_*`
/// tables. No sorting is applied: ordering for loading is decided by the
/// target schema's foreign keys, not by the source.
///
/// # Examples
///
/// ```no_run
/// # use postgres_bulk_loader::sqlite::{open_sqlite, reader::list_tables};
/// # fn example() -> anyhow::Result<()> {
/// let conn = open_sqlite("project2normalized.db")?;
/// for table in list_tables(&conn)? {
///     println!("Table: {}", table);
/// }
/// # Ok(())
/// # }
/// ```
pub fn list_tables(conn: &Connection) -> Result<Vec<String>> {
    tracing::debug!("Listing tables from SQLite database");

    let mut stmt = conn
        .prepare(
            "SELECT name FROM sqlite_master \
             WHERE type='table' \
             AND name NOT LIKE 'sqlite_%'",
        )
        .context("Failed to prepare statement to list tables")?;

    let tables = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .context("Failed to query table list")?
        .collect::<Result<Vec<String>, _>>()
        .context("Failed to collect table names")?;

    tracing::info!("Found {} user tables in SQLite database", tables.len());

    Ok(tables)
}

/// Get row count for a specific table
///
/// The table name is validated before being interpolated into SQL.
pub fn get_table_row_count(conn: &Connection, table: &str) -> Result<usize> {
    validate_postgres_identifier(table).context("Invalid table name for row count query")?;

    let query = format!("SELECT COUNT(*) FROM \"{}\"", table);

    let count: i64 = conn
        .query_row(&query, [], |row| row.get(0))
        .with_context(|| format!("Failed to count rows in table '{}'", table))?;

    Ok(count as usize)
}

/// Prepare `SELECT *` over a table for use with [`TableCursor`]
pub fn prepare_select_all<'conn>(conn: &'conn Connection, table: &str) -> Result<Statement<'conn>> {
    validate_postgres_identifier(table).context("Invalid table name for data reading")?;

    // Table name is validated above
    let query = format!("SELECT * FROM \"{}\"", table);

    conn.prepare(&query)
        .with_context(|| format!("Failed to prepare statement for table '{}'", table))
}

/// Forward-only cursor that hands out a table's rows in bounded pages
///
/// Only the current page is held in memory; the statement keeps its place
/// between calls to [`TableCursor::next_page`].
pub struct TableCursor<'stmt> {
    columns: Vec<String>,
    rows: Rows<'stmt>,
    exhausted: bool,
}

impl<'stmt> TableCursor<'stmt> {
    pub fn open(stmt: &'stmt mut Statement<'_>) -> rusqlite::Result<Self> {
        let columns = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let rows = stmt.query([])?;

        Ok(Self {
            columns,
            rows,
            exhausted: false,
        })
    }

    /// Column names as reported by the cursor's result metadata
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Fetch up to `batch_size` rows; an empty page means the cursor is exhausted
    pub fn next_page(&mut self, batch_size: usize) -> rusqlite::Result<Vec<Vec<Value>>> {
        let mut page = Vec::new();
        if self.exhausted {
            return Ok(page);
        }

        let width = self.columns.len();
        while page.len() < batch_size {
            match self.rows.next()? {
                Some(row) => {
                    let mut values = Vec::with_capacity(width);
                    for idx in 0..width {
                        values.push(row.get::<_, Value>(idx)?);
                    }
                    page.push(values);
                }
                None => {
                    self.exhausted = true;
                    break;
                }
            }
        }

        Ok(page)
    }
}

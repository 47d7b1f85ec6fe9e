// ABOUTME: PostgreSQL implementation of the loader's TargetWriter
// ABOUTME: Resets the schema and bulk-inserts pages with one UNNEST statement per page

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use tokio_postgres::types::ToSql;
use tokio_postgres::Client;

use crate::error::{classify_write_error, MigrationError};
use crate::schema::{ddl, ColumnType, Schema};
use crate::target::{CellValue, Page, PageOutcome, TargetWriter};
use crate::utils::validate_postgres_identifier;

/// One column of a page, bound as a single PostgreSQL array parameter
#[derive(Debug)]
enum ColumnArray {
    Integer(Vec<Option<i32>>),
    Real(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
    Timestamp(Vec<Option<NaiveDateTime>>),
}

impl ColumnArray {
    fn with_capacity(column_type: ColumnType, capacity: usize) -> Self {
        match column_type {
            ColumnType::Serial | ColumnType::Integer => {
                ColumnArray::Integer(Vec::with_capacity(capacity))
            }
            ColumnType::Real => ColumnArray::Real(Vec::with_capacity(capacity)),
            ColumnType::Text => ColumnArray::Text(Vec::with_capacity(capacity)),
            ColumnType::Timestamp => ColumnArray::Timestamp(Vec::with_capacity(capacity)),
        }
    }

    fn push(&mut self, cell: &CellValue) -> Result<()> {
        match (self, cell) {
            (ColumnArray::Integer(v), CellValue::Integer(i)) => v.push(Some(*i)),
            (ColumnArray::Integer(v), CellValue::Null) => v.push(None),
            (ColumnArray::Real(v), CellValue::Real(f)) => v.push(Some(*f)),
            (ColumnArray::Real(v), CellValue::Null) => v.push(None),
            (ColumnArray::Text(v), CellValue::Text(s)) => v.push(Some(s.clone())),
            (ColumnArray::Text(v), CellValue::Null) => v.push(None),
            (ColumnArray::Timestamp(v), CellValue::Timestamp(ts)) => v.push(Some(*ts)),
            (ColumnArray::Timestamp(v), CellValue::Null) => v.push(None),
            (array, cell) => bail!("cannot bind {:?} into {}", cell, array.kind()),
        }
        Ok(())
    }

    fn kind(&self) -> &'static str {
        match self {
            ColumnArray::Integer(_) => "an INTEGER column",
            ColumnArray::Real(_) => "a DOUBLE PRECISION column",
            ColumnArray::Text(_) => "a TEXT column",
            ColumnArray::Timestamp(_) => "a TIMESTAMP column",
        }
    }

    fn as_param(&self) -> &(dyn ToSql + Sync) {
        match self {
            ColumnArray::Integer(v) => v,
            ColumnArray::Real(v) => v,
            ColumnArray::Text(v) => v,
            ColumnArray::Timestamp(v) => v,
        }
    }
}

/// Build the insert-or-ignore statement for a page's column layout
///
/// Each column travels as one typed array and `UNNEST` zips them back into
/// rows, so a page of any size is a single statement with one parameter per
/// column. `ON CONFLICT DO NOTHING` without a conflict target skips rows that
/// collide on the primary key or on any UNIQUE column.
///
/// # Examples
///
/// ```
/// # use postgres_bulk_loader::postgres::writer::build_insert_sql;
/// # use postgres_bulk_loader::schema::sales_schema;
/// # use postgres_bulk_loader::target::Page;
/// let schema = sales_schema();
/// let region = schema.table("Region").unwrap();
/// let page = Page { table: region, columns: region.columns.iter().collect(), rows: vec![] };
/// let sql = build_insert_sql(&page).unwrap();
/// assert_eq!(
///     sql,
///     concat!(
///         "INSERT INTO Region (RegionID, Region) ",
///         "SELECT * FROM UNNEST($1::int4[], $2::text[]) ON CONFLICT DO NOTHING"
///     )
/// );
/// ```
pub fn build_insert_sql(page: &Page<'_>) -> Result<String> {
    validate_postgres_identifier(&page.table.name).context("Invalid target table name")?;

    let mut names = Vec::with_capacity(page.columns.len());
    let mut arrays = Vec::with_capacity(page.columns.len());
    for (idx, column) in page.columns.iter().enumerate() {
        validate_postgres_identifier(&column.name).context("Invalid target column name")?;
        names.push(column.name.as_str());
        arrays.push(format!("${}::{}", idx + 1, column.column_type.array_type()));
    }

    Ok(format!(
        "INSERT INTO {} ({}) SELECT * FROM UNNEST({}) ON CONFLICT DO NOTHING",
        page.table.name,
        names.join(", "),
        arrays.join(", ")
    ))
}

fn build_column_arrays(page: &Page<'_>) -> Result<Vec<ColumnArray>> {
    let mut arrays: Vec<ColumnArray> = page
        .columns
        .iter()
        .map(|c| ColumnArray::with_capacity(c.column_type, page.rows.len()))
        .collect();

    for (row_num, row) in page.rows.iter().enumerate() {
        if row.len() != arrays.len() {
            bail!(
                "Row {} of page for '{}' has {} values, expected {}",
                row_num + 1,
                page.table.name,
                row.len(),
                arrays.len()
            );
        }
        for (idx, cell) in row.iter().enumerate() {
            arrays[idx].push(cell).with_context(|| {
                format!("Column '{}.{}'", page.table.name, page.columns[idx].name)
            })?;
        }
    }

    Ok(arrays)
}

/// Bulk loader target backed by a single PostgreSQL connection
///
/// Transactions are opened lazily by the first insert and closed by
/// `commit` or `rollback`. Dropping the writer closes the connection, which
/// makes the server discard any transaction still open.
pub struct PostgresTarget {
    client: Client,
    in_transaction: bool,
}

impl PostgresTarget {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            in_transaction: false,
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl TargetWriter for PostgresTarget {
    async fn reset_schema(&mut self, schema: &Schema) -> Result<()> {
        let script = ddl::reset_script(schema)?;

        tracing::info!("Recreating {} target tables", schema.tables().len());
        tracing::debug!("Schema reset script:\n{}", script);

        // A multi-statement simple query runs as one implicit transaction
        self.client
            .batch_execute(&script)
            .await
            .map_err(|e| MigrationError::Schema(e.to_string()))?;

        tracing::info!("✓ Tables created successfully");
        Ok(())
    }

    async fn insert_page(&mut self, page: &Page<'_>) -> Result<PageOutcome> {
        if page.is_empty() {
            return Ok(PageOutcome::default());
        }

        let sql = build_insert_sql(page)?;
        let arrays = build_column_arrays(page)?;
        let params: Vec<&(dyn ToSql + Sync)> = arrays.iter().map(ColumnArray::as_param).collect();

        if !self.in_transaction {
            self.client
                .batch_execute("BEGIN")
                .await
                .map_err(|e| classify_write_error(&page.table.name, e))?;
            self.in_transaction = true;
        }

        let affected = self
            .client
            .execute(sql.as_str(), &params)
            .await
            .map_err(|e| classify_write_error(&page.table.name, e))?;

        let outcome = PageOutcome::from_affected(page.len(), affected);
        if outcome.skipped > 0 {
            tracing::debug!(
                "Skipped {} duplicate row(s) in '{}'",
                outcome.skipped,
                page.table.name
            );
        }

        Ok(outcome)
    }

    async fn commit(&mut self) -> Result<()> {
        if !self.in_transaction {
            return Ok(());
        }
        // The server leaves the transaction whether or not COMMIT succeeds
        self.in_transaction = false;
        self.client
            .batch_execute("COMMIT")
            .await
            .context("Failed to commit page")
    }

    async fn rollback(&mut self) -> Result<()> {
        if !self.in_transaction {
            return Ok(());
        }
        self.in_transaction = false;
        self.client
            .batch_execute("ROLLBACK")
            .await
            .context("Failed to roll back page")
    }
}

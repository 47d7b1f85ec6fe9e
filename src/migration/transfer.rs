// ABOUTME: Paged transfer loop that copies SQLite tables into the target store
// ABOUTME: One bulk insert and one commit per page, parents before children, stop on first failure

use anyhow::{anyhow, Context, Result};
use rusqlite::types::Value;
use rusqlite::Connection;
use std::time::Instant;

use super::report::{format_duration, MigrationReport, TableReport};
use crate::error::MigrationError;
use crate::schema::{ColumnDef, Schema, TableDef};
use crate::sqlite::converter::sqlite_value_to_cell;
use crate::sqlite::reader::{get_table_row_count, list_tables, prepare_select_all, TableCursor};
use crate::target::{CellValue, Page, TargetWriter};

/// A source table paired with the target table it loads into
#[derive(Debug)]
pub struct PlannedTable<'s> {
    /// Name as spelled in the source catalog
    pub source_name: String,
    pub table: &'s TableDef,
}

/// Decide which source tables to load and in what order
///
/// Tables come out in the schema's dependency order so that referenced rows
/// exist before the rows that point at them. Source tables the schema does
/// not know are returned separately and never loaded.
pub fn plan_tables<'s>(
    source: &Connection,
    schema: &'s Schema,
) -> Result<(Vec<PlannedTable<'s>>, Vec<String>)> {
    let source_tables = list_tables(source)?;

    let ignored: Vec<String> = source_tables
        .iter()
        .filter(|name| schema.table(name).is_none())
        .cloned()
        .collect();
    for name in &ignored {
        tracing::warn!(
            "Skipping source table '{}': not part of the target schema",
            name
        );
    }

    let mut plan = Vec::new();
    for table in schema.dependency_order()? {
        match source_tables
            .iter()
            .find(|name| name.eq_ignore_ascii_case(&table.name))
        {
            Some(source_name) => plan.push(PlannedTable {
                source_name: source_name.clone(),
                table,
            }),
            None => tracing::warn!("Table '{}' is missing from the source", table.name),
        }
    }

    Ok((plan, ignored))
}

/// Copy every known source table into `target`, one committed page at a time
///
/// Errors inside the loop stop the run: the open transaction is rolled back,
/// the error is logged and recorded in the report, and pages committed before
/// it are kept. The returned report is never an `Err`.
pub async fn transfer_all<T>(
    source: &Connection,
    target: &mut T,
    schema: &Schema,
    batch_size: usize,
) -> MigrationReport
where
    T: TargetWriter + ?Sized,
{
    let started = Instant::now();
    let mut report = MigrationReport::default();

    if batch_size == 0 {
        let err = anyhow!("Batch size must be at least 1");
        tracing::error!("{}", err);
        report.failure = Some(err);
        return report;
    }

    let plan = match plan_tables(source, schema) {
        Ok((plan, ignored)) => {
            report.skipped_tables = ignored;
            plan
        }
        Err(err) => {
            tracing::error!("Failed to plan table transfer: {:#}", err);
            report.failure = Some(err);
            report.duration = started.elapsed();
            return report;
        }
    };

    for planned in plan {
        let mut table_report = TableReport::new(&planned.table.name);
        let result =
            transfer_table(source, target, &planned, batch_size, &mut table_report).await;
        report.tables.push(table_report);

        if let Err(err) = result {
            if let Err(rollback_err) = target.rollback().await {
                tracing::warn!("Rollback after failure also failed: {:#}", rollback_err);
            }
            tracing::error!(
                "Migration failed on table '{}': {:#}",
                planned.table.name,
                err
            );
            report.failure = Some(err);
            break;
        }
    }

    report.duration = started.elapsed();
    tracing::info!("Total Migration Time: {}", format_duration(report.duration));

    report
}

async fn transfer_table<T>(
    source: &Connection,
    target: &mut T,
    planned: &PlannedTable<'_>,
    batch_size: usize,
    report: &mut TableReport,
) -> Result<()>
where
    T: TargetWriter + ?Sized,
{
    let table = planned.table;
    let started = Instant::now();

    match get_table_row_count(source, &planned.source_name) {
        Ok(count) => tracing::info!("--- Starting Table: {} ({} rows) ---", table.name, count),
        Err(_) => tracing::info!("--- Starting Table: {} ---", table.name),
    }

    let result = copy_pages(source, target, planned, batch_size, report).await;
    report.duration = started.elapsed();
    result?;

    report.completed = true;
    tracing::info!(
        ">>> Finished {}: {} rows in {}",
        table.name,
        report.rows_read,
        format_duration(report.duration)
    );

    Ok(())
}

async fn copy_pages<T>(
    source: &Connection,
    target: &mut T,
    planned: &PlannedTable<'_>,
    batch_size: usize,
    report: &mut TableReport,
) -> Result<()>
where
    T: TargetWriter + ?Sized,
{
    let table = planned.table;
    let read_error = |source: rusqlite::Error| MigrationError::Read {
        table: table.name.clone(),
        source,
    };

    let mut stmt = prepare_select_all(source, &planned.source_name)?;
    let mut cursor = TableCursor::open(&mut stmt).map_err(read_error)?;
    let columns = resolve_columns(table, cursor.columns())?;

    loop {
        let page_started = Instant::now();

        let raw_rows = cursor.next_page(batch_size).map_err(read_error)?;
        if raw_rows.is_empty() {
            return Ok(());
        }
        let first_row = report.rows_read + 1;
        report.rows_read += raw_rows.len() as u64;

        let page = convert_page(table, &columns, raw_rows, first_row)?;
        let outcome = target
            .insert_page(&page)
            .await
            .with_context(|| format!("Failed to insert page of {} rows", page.len()))?;
        target.commit().await?;

        report.pages += 1;
        report.rows_inserted += outcome.inserted;
        report.rows_skipped += outcome.skipped;

        tracing::info!(
            " Total Batch of {} rows: {:.2} sec",
            report.rows_read,
            page_started.elapsed().as_secs_f64()
        );
    }
}

/// Match the cursor's column names to the target table's columns
fn resolve_columns<'t>(
    table: &'t TableDef,
    source_columns: &[String],
) -> Result<Vec<&'t ColumnDef>> {
    source_columns
        .iter()
        .map(|name| {
            table.find_column(name).ok_or_else(|| {
                anyhow!(MigrationError::Schema(format!(
                    "source column '{}' has no counterpart in target table '{}'",
                    name, table.name
                )))
            })
        })
        .collect()
}

fn convert_page<'t>(
    table: &'t TableDef,
    columns: &[&'t ColumnDef],
    raw_rows: Vec<Vec<Value>>,
    first_row: u64,
) -> Result<Page<'t>> {
    let mut rows = Vec::with_capacity(raw_rows.len());

    for (offset, raw) in raw_rows.into_iter().enumerate() {
        let mut row = Vec::with_capacity(columns.len());
        for (value, column) in raw.iter().zip(columns) {
            let cell: CellValue = sqlite_value_to_cell(value, column.column_type).map_err(|e| {
                MigrationError::InvalidValue {
                    table: table.name.clone(),
                    column: column.name.clone(),
                    message: format!("row {}: {:#}", first_row + offset as u64, e),
                }
            })?;
            row.push(cell);
        }
        rows.push(row);
    }

    Ok(Page {
        table,
        columns: columns.to_vec(),
        rows,
    })
}

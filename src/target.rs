// ABOUTME: Target-side page model and the writer trait the orchestrator drives
// ABOUTME: Separates transfer logic from the PostgreSQL client so it can run against any store

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::schema::{ColumnDef, Schema, TableDef};

/// A single value already converted to its target column type
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Integer(i32),
    Real(f64),
    Text(String),
    Timestamp(NaiveDateTime),
}

/// One batch of rows bound for a single target table
///
/// `columns` follows the source cursor's column order; every row carries one
/// value per column.
#[derive(Debug)]
pub struct Page<'a> {
    pub table: &'a TableDef,
    pub columns: Vec<&'a ColumnDef>,
    pub rows: Vec<Vec<CellValue>>,
}

impl Page<'_> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Result of one duplicate-tolerant insert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageOutcome {
    /// Rows newly written to the target
    pub inserted: u64,
    /// Rows dropped because their primary or unique key already existed
    pub skipped: u64,
}

impl PageOutcome {
    /// Build an outcome from the page size and the driver's affected-row count
    pub fn from_affected(page_rows: usize, affected: u64) -> Self {
        let attempted = page_rows as u64;
        Self {
            inserted: affected.min(attempted),
            skipped: attempted.saturating_sub(affected),
        }
    }
}

/// Destination store for the bulk loader
///
/// `insert_page` runs inside a transaction that stays open until `commit`
/// or `rollback`; one page is one transaction.
#[async_trait]
pub trait TargetWriter: Send {
    /// Drop and recreate every table in `schema`
    async fn reset_schema(&mut self, schema: &Schema) -> Result<()>;

    /// Insert a page with insert-or-ignore semantics on key conflicts
    async fn insert_page(&mut self, page: &Page<'_>) -> Result<PageOutcome>;

    /// Make the rows of the current transaction durable
    async fn commit(&mut self) -> Result<()>;

    /// Discard the current transaction; a no-op when none is open
    async fn rollback(&mut self) -> Result<()>;
}

// ABOUTME: Shared fixtures for integration tests
// ABOUTME: In-memory TargetWriter with key and foreign-key checks, plus sample SQLite files

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use rusqlite::Connection;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use postgres_bulk_loader::schema::{ColumnType, Schema, TableDef};
use postgres_bulk_loader::target::{CellValue, Page, PageOutcome, TargetWriter};

type Rows = Vec<Vec<CellValue>>;

/// In-memory stand-in for PostgreSQL
///
/// Rows are stored in the table's declared column order. Primary and unique
/// key conflicts are skipped per row, foreign keys are enforced, and pending
/// rows only become visible in `committed` after `commit`.
#[derive(Debug)]
pub struct RecordingTarget {
    schema: Schema,
    committed: HashMap<String, Rows>,
    pending: HashMap<String, Rows>,
    in_transaction: bool,
    current_table: Option<String>,
    /// (table, rows in page) for every insert call
    pub insert_calls: Vec<(String, usize)>,
    /// Table of each committed transaction
    pub commits: Vec<String>,
    pub rollbacks: usize,
    pub resets: usize,
    /// 1-based insert call that fails before touching any row
    pub fail_on_call: Option<usize>,
}

impl RecordingTarget {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            committed: HashMap::new(),
            pending: HashMap::new(),
            in_transaction: false,
            current_table: None,
            insert_calls: Vec::new(),
            commits: Vec::new(),
            rollbacks: 0,
            resets: 0,
            fail_on_call: None,
        }
    }

    /// Committed rows of `table`, in insertion order
    pub fn rows(&self, table: &str) -> Rows {
        self.committed
            .get(&table.to_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    pub fn calls_for(&self, table: &str) -> Vec<usize> {
        self.insert_calls
            .iter()
            .filter(|(t, _)| t.eq_ignore_ascii_case(table))
            .map(|(_, n)| *n)
            .collect()
    }

    pub fn commits_for(&self, table: &str) -> usize {
        self.commits
            .iter()
            .filter(|t| t.eq_ignore_ascii_case(table))
            .count()
    }

    fn visible(&self, table: &str) -> impl Iterator<Item = &Vec<CellValue>> {
        let key = table.to_lowercase();
        self.committed
            .get(&key)
            .into_iter()
            .chain(self.pending.get(&key))
            .flatten()
    }

    fn column_index(table: &TableDef, column: &str) -> usize {
        table
            .columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(column))
            .unwrap_or_else(|| panic!("unknown column {}.{}", table.name, column))
    }

    fn next_serial(&self, table: &TableDef, idx: usize) -> i32 {
        self.visible(&table.name)
            .filter_map(|row| match row[idx] {
                CellValue::Integer(i) => Some(i),
                _ => None,
            })
            .max()
            .unwrap_or(0)
            + 1
    }

    /// Expand a page row into the table's declared column order
    fn full_row(
        &self,
        page: &Page<'_>,
        row: &[CellValue],
        pending: &Rows,
    ) -> Result<Vec<CellValue>> {
        let table = page.table;
        let mut full = vec![CellValue::Null; table.columns.len()];
        for (value, column) in row.iter().zip(&page.columns) {
            full[Self::column_index(table, &column.name)] = value.clone();
        }

        for (idx, column) in table.columns.iter().enumerate() {
            if full[idx] != CellValue::Null {
                continue;
            }
            if column.column_type == ColumnType::Serial {
                let in_page = pending
                    .iter()
                    .filter_map(|r| match r[idx] {
                        CellValue::Integer(i) => Some(i),
                        _ => None,
                    })
                    .max()
                    .unwrap_or(0);
                full[idx] = CellValue::Integer(self.next_serial(table, idx).max(in_page + 1));
            } else if !column.nullable {
                bail!(
                    "null value in column \"{}\" of relation \"{}\" violates not-null constraint",
                    column.name,
                    table.name
                );
            }
        }

        Ok(full)
    }

    fn check_foreign_keys(
        &self,
        table: &TableDef,
        row: &[CellValue],
        pending: &Rows,
    ) -> Result<()> {
        for fk in &table.foreign_keys {
            let value = &row[Self::column_index(table, &fk.column)];
            let parent = self
                .schema
                .table(&fk.references_table)
                .unwrap_or_else(|| panic!("unknown table {}", fk.references_table));
            let parent_idx = Self::column_index(parent, &fk.references_column);

            let same_table = parent.name.eq_ignore_ascii_case(&table.name);
            let found = self.visible(&parent.name).any(|r| &r[parent_idx] == value)
                || (same_table && pending.iter().any(|r| &r[parent_idx] == value));
            if !found {
                bail!(
                    "insert or update on table \"{}\" violates foreign key constraint on {} = {:?}",
                    table.name,
                    fk.column,
                    value
                );
            }
        }
        Ok(())
    }

    /// Positions of the primary key and every UNIQUE column
    fn key_positions(table: &TableDef) -> Vec<usize> {
        table
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.unique || c.name == table.primary_key)
            .map(|(idx, _)| idx)
            .collect()
    }

    fn conflicts(&self, table: &TableDef, row: &[CellValue], pending: &Rows) -> bool {
        Self::key_positions(table).into_iter().any(|idx| {
            self.visible(&table.name)
                .chain(pending.iter())
                .any(|existing| existing[idx] == row[idx])
        })
    }
}

#[async_trait]
impl TargetWriter for RecordingTarget {
    async fn reset_schema(&mut self, schema: &Schema) -> Result<()> {
        self.schema = schema.clone();
        self.committed.clear();
        self.pending.clear();
        self.in_transaction = false;
        self.resets += 1;
        Ok(())
    }

    async fn insert_page(&mut self, page: &Page<'_>) -> Result<PageOutcome> {
        self.in_transaction = true;
        self.current_table = Some(page.table.name.clone());
        self.insert_calls.push((page.table.name.clone(), page.len()));

        if self.fail_on_call == Some(self.insert_calls.len()) {
            bail!("connection reset by peer");
        }

        // A failed statement leaves nothing of its page behind
        let mut staged: Rows = Vec::new();
        let mut outcome = PageOutcome::default();
        for row in &page.rows {
            let full = self.full_row(page, row, &staged)?;
            if self.conflicts(page.table, &full, &staged) {
                outcome.skipped += 1;
                continue;
            }
            self.check_foreign_keys(page.table, &full, &staged)?;
            staged.push(full);
            outcome.inserted += 1;
        }

        self.pending
            .entry(page.table.name.to_lowercase())
            .or_default()
            .extend(staged);
        Ok(outcome)
    }

    async fn commit(&mut self) -> Result<()> {
        if !self.in_transaction {
            return Ok(());
        }
        for (table, rows) in self.pending.drain() {
            self.committed.entry(table).or_default().extend(rows);
        }
        if let Some(table) = self.current_table.take() {
            self.commits.push(table);
        }
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        if !self.in_transaction {
            return Ok(());
        }
        self.pending.clear();
        self.current_table = None;
        self.rollbacks += 1;
        self.in_transaction = false;
        Ok(())
    }
}

pub const SALES_DDL: &str = "
    CREATE TABLE Region (
        RegionID INTEGER PRIMARY KEY,
        Region TEXT NOT NULL
    );
    CREATE TABLE Country (
        CountryID INTEGER PRIMARY KEY,
        Country TEXT NOT NULL,
        RegionID INTEGER NOT NULL
    );
    CREATE TABLE Customer (
        CustomerID INTEGER PRIMARY KEY,
        FirstName TEXT NOT NULL,
        LastName TEXT NOT NULL,
        Address TEXT NOT NULL,
        City TEXT NOT NULL,
        CountryID INTEGER NOT NULL
    );
    CREATE TABLE ProductCategory (
        ProductCategoryID INTEGER PRIMARY KEY,
        ProductCategory TEXT NOT NULL,
        ProductCategoryDescription TEXT NOT NULL
    );
    CREATE TABLE Product (
        ProductID INTEGER PRIMARY KEY,
        ProductName TEXT NOT NULL,
        ProductUnitPrice REAL NOT NULL,
        ProductCategoryID INTEGER NOT NULL
    );
    CREATE TABLE OrderDetail (
        OrderID INTEGER PRIMARY KEY,
        CustomerID INTEGER NOT NULL,
        ProductID INTEGER NOT NULL,
        OrderDate TEXT NOT NULL,
        QuantityOrdered INTEGER NOT NULL
    );
";

pub const SALES_ROWS: &str = "
    INSERT INTO Region VALUES (1, 'Americas'), (2, 'Europe');
    INSERT INTO Country VALUES (1, 'Canada', 1), (2, 'Germany', 2);
    INSERT INTO Customer VALUES
        (1, 'Maria', 'Anders', 'Obere Str. 57', 'Berlin', 2),
        (2, 'Yoshi', 'Tannamuri', '1900 Oak St.', 'Vancouver', 1);
    INSERT INTO ProductCategory VALUES (1, 'Confections', 'Desserts, candies, and sweet breads');
    INSERT INTO Product VALUES (1, 'Chocolade', 12.75, 1), (2, 'Teatime Biscuits', 9.2, 1);
    INSERT INTO OrderDetail VALUES
        (1, 1, 1, '2014-01-02 00:00:00', 3),
        (2, 1, 2, '2014-01-03 00:00:00', 1),
        (3, 2, 1, '2014-02-10 00:00:00', 12),
        (4, 2, 2, '2014-03-15 00:00:00', 5),
        (5, 1, 1, '2015-06-30 00:00:00', 2);
";

/// Create a SQLite file at `dir/name` by running `sql`
pub fn create_sqlite(dir: &Path, name: &str, sql: &str) -> PathBuf {
    let path = dir.join(name);
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(sql).unwrap();
    path
}

/// Create the sample sales database with all six tables populated
pub fn create_sales_db(dir: &Path) -> PathBuf {
    create_sqlite(dir, "sales.db", &format!("{}{}", SALES_DDL, SALES_ROWS))
}

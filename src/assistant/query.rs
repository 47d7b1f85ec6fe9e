// ABOUTME: Executes assistant-generated SQL inside a read-only transaction
// ABOUTME: Collects rows as text and renders them as a terminal table

use anyhow::{bail, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use tabled::builder::Builder;
use tabled::settings::Style;
use tokio_postgres::{Client, SimpleQueryMessage};

/// Rows returned by a query, every value in PostgreSQL's text form
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl QueryResult {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Collect the rows of the last result set in a simple-query response
    pub fn from_messages(messages: Vec<SimpleQueryMessage>) -> Self {
        let mut result = QueryResult::default();

        for message in messages {
            match message {
                SimpleQueryMessage::RowDescription(columns) => {
                    // A later statement replaces the result of an earlier one
                    result.columns = columns.iter().map(|c| c.name().to_string()).collect();
                    result.rows.clear();
                }
                SimpleQueryMessage::Row(row) => {
                    if result.columns.is_empty() {
                        result.columns =
                            row.columns().iter().map(|c| c.name().to_string()).collect();
                    }
                    let values = (0..row.len())
                        .map(|idx| row.get(idx).map(str::to_string))
                        .collect();
                    result.rows.push(values);
                }
                _ => {}
            }
        }

        result
    }

    /// Render as a rounded table, NULL shown literally
    pub fn render(&self) -> String {
        if self.columns.is_empty() {
            return String::from("(no columns)");
        }

        let mut builder = Builder::default();
        builder.push_record(self.columns.iter().cloned());
        for row in &self.rows {
            builder.push_record(
                row.iter()
                    .map(|value| value.clone().unwrap_or_else(|| "NULL".to_string())),
            );
        }

        let mut table = builder.build();
        table.with(Style::rounded());
        table.to_string()
    }
}

static TRANSACTION_CONTROL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)^\s*(begin|start|commit|end|rollback|abort",
        r"|savepoint|release|prepare\s+transaction)\b"
    ))
    .expect("Invalid regex")
});

/// Reject input the read-only guard cannot contain
///
/// Transaction control would end the READ ONLY transaction early, and
/// anything after it would run in autocommit.
pub fn check_single_query(sql: &str) -> Result<&str> {
    let sql = sql.trim().trim_end_matches(';').trim_end();
    if sql.is_empty() {
        bail!("Query is empty");
    }
    if TRANSACTION_CONTROL.is_match(sql) {
        bail!("Transaction control statements are not allowed");
    }
    Ok(sql)
}

/// Run a single statement in a READ ONLY transaction that is always rolled back
///
/// The statement is parsed with the extended protocol first, which refuses
/// strings holding more than one command, so nothing can escape the
/// transaction. Statements that try to modify data then fail with
/// PostgreSQL's read-only-transaction error.
pub async fn run_read_only_query(client: &mut Client, sql: &str) -> Result<QueryResult> {
    let sql = check_single_query(sql)?;

    let transaction = client
        .build_transaction()
        .read_only(true)
        .start()
        .await
        .context("Failed to start read-only transaction")?;

    transaction
        .prepare(sql)
        .await
        .context("Only a single SQL statement can be run")?;

    let messages = transaction
        .simple_query(sql)
        .await
        .context("Failed to execute query")?;

    transaction
        .rollback()
        .await
        .context("Failed to close read-only transaction")?;

    Ok(QueryResult::from_messages(messages))
}

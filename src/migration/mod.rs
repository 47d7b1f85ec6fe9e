// ABOUTME: Bulk migration from the SQLite source into the target store
// ABOUTME: Exposes the paged transfer loop and its per-table reports

pub mod report;
pub mod transfer;

pub use report::{format_duration, MigrationReport, TableReport};
pub use transfer::{plan_tables, transfer_all, PlannedTable};

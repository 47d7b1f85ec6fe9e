// ABOUTME: Library module for postgres-bulk-loader
// ABOUTME: Exports the loader, query assistant, and shared database plumbing

pub mod assistant;
pub mod commands;
pub mod config;
pub mod error;
pub mod migration;
pub mod postgres;
pub mod schema;
pub mod sqlite;
pub mod target;
pub mod utils;

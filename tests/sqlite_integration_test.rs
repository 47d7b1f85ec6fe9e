// ABOUTME: Integration tests for the migrate command end to end
// ABOUTME: Runs a SQLite file through config, connection, schema reset, and transfer

mod common;

use common::create_sales_db;
use postgres_bulk_loader::commands;
use postgres_bulk_loader::config::{LoaderConfig, TargetConfig};
use postgres_bulk_loader::error::MigrationError;
use std::env;
use tokio_postgres::config::Host;

/// Build a target config from TEST_TARGET_URL
fn target_from_test_url() -> TargetConfig {
    let url = env::var("TEST_TARGET_URL").expect("TEST_TARGET_URL must be set");
    let parsed: tokio_postgres::Config = url.parse().expect("TEST_TARGET_URL must be a valid URL");

    let host = match parsed.get_hosts().first() {
        Some(Host::Tcp(host)) => host.clone(),
        _ => "localhost".to_string(),
    };
    let server = match parsed.get_ports().first() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    };

    TargetConfig {
        username: parsed.get_user().unwrap_or("postgres").to_string(),
        password: parsed
            .get_password()
            .map(|p| String::from_utf8_lossy(p).to_string())
            .unwrap_or_default(),
        server,
        database: parsed.get_dbname().unwrap_or("postgres").to_string(),
    }
}

#[tokio::test]
async fn test_missing_source_fails_before_touching_target() {
    let dir = tempfile::tempdir().unwrap();
    let config = LoaderConfig {
        target: TargetConfig {
            username: "loader".to_string(),
            password: "secret".to_string(),
            // Unroutable; the run must stop before trying it
            server: "192.0.2.1:5432".to_string(),
            database: "sales".to_string(),
        },
        sqlite_path: dir.path().join("absent.db").to_str().unwrap().to_string(),
        batch_size: 100,
    };

    let err = commands::migrate(&config).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<MigrationError>(),
        Some(MigrationError::Connection { store: "source", .. })
    ));
}

#[tokio::test]
#[ignore]
async fn test_migrate_command_full_refresh() {
    let dir = tempfile::tempdir().unwrap();
    let path = create_sales_db(dir.path());
    let config = LoaderConfig {
        target: target_from_test_url(),
        sqlite_path: path.to_str().unwrap().to_string(),
        batch_size: 2,
    };

    let first = commands::migrate(&config).await.unwrap();
    assert!(first.is_success(), "unexpected failure: {:?}", first.failure);
    assert_eq!(first.rows_inserted(), 14);

    // Full refresh: the second run starts from empty tables again
    let second = commands::migrate(&config).await.unwrap();
    assert!(second.is_success());
    assert_eq!(second.rows_inserted(), 14);
    assert_eq!(second.rows_skipped(), 0);
}

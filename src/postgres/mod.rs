// ABOUTME: PostgreSQL side of the loader and the query assistant
// ABOUTME: Connection setup plus the bulk-insert TargetWriter implementation

pub mod connection;
pub mod writer;

pub use connection::connect;
pub use writer::PostgresTarget;

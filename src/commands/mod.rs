// ABOUTME: Command implementations shared by the binaries
// ABOUTME: Exports the full-refresh migrate command

pub mod migrate;

pub use migrate::migrate;

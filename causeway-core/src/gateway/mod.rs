//! The per-engine database capability set the orchestrator drives.
//!
//! Engine variants differ only in SQL dialect and catalog probes; all
//! run/skip/record decisions live in the orchestrator.

pub mod postgres;
pub mod sqlite;

use std::time::Duration;

use async_trait::async_trait;

use crate::bookkeeping::{ScriptErrorRecord, ScriptRecord};
use crate::config::{CausewayConfig, DatabaseType};
use crate::error::Result;

pub use postgres::PostgresGateway;
pub use sqlite::SqliteGateway;

/// Quote a SQL identifier: doubles embedded double-quotes and wraps the
/// name in double-quotes. Works for both supported engines.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Capability contract over one database engine.
///
/// The orchestrator owns the gateway exclusively for the duration of a run;
/// implementations never share or cache connections across runs.
#[async_trait]
pub trait DatabaseGateway: Send {
    /// Open the connection to the target database.
    async fn open(&mut self) -> Result<()>;

    /// Release the connection. Safe to call when already closed.
    async fn close(&mut self) -> Result<()>;

    /// Create the target database if absent. No-op for engines without a
    /// separate administrative surface. Called before `open`.
    async fn ensure_database_exists(&mut self) -> Result<()>;

    /// Idempotently create the bookkeeping tables (and schema, where the
    /// engine has one).
    async fn ensure_bookkeeping(&mut self) -> Result<()>;

    async fn begin_transaction(&mut self) -> Result<()>;
    async fn commit(&mut self) -> Result<()>;
    async fn rollback(&mut self) -> Result<()>;

    /// Run one script's text against the current connection/transaction.
    async fn execute(&mut self, sql: &str, timeout: Duration) -> Result<()>;

    /// Recorded checksum of a previously applied run-once script, if any.
    async fn has_run(&mut self, script_name: &str) -> Result<Option<String>>;

    /// Record a successful run-once application. Participates in the
    /// migration transaction, so a later rollback discards it too.
    async fn record_success(&mut self, record: &ScriptRecord) -> Result<()>;

    /// Record a failed execution attempt. Always committed outside the
    /// migration transaction so it survives rollback.
    async fn record_failure(&mut self, record: &ScriptErrorRecord) -> Result<()>;
}

/// Build the gateway variant for the configured engine.
pub fn create(config: &CausewayConfig) -> Result<Box<dyn DatabaseGateway>> {
    match config.database_type {
        DatabaseType::Postgres => Ok(Box::new(PostgresGateway::new(config))),
        DatabaseType::Sqlite => Ok(Box::new(SqliteGateway::new(config))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("causeway"), "\"causeway\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}

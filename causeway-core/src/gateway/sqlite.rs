//! SQLite gateway: embedded file-based engine.
//!
//! There is no administrative surface; the database exists once the file
//! does. SQLite has no schemas either, so bookkeeping tables carry the
//! schema name as a prefix instead.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension};

use crate::bookkeeping::{
    ScriptErrorRecord, ScriptRecord, SCRIPTS_RUN_ERRORS_TABLE, SCRIPTS_RUN_TABLE,
};
use crate::config::CausewayConfig;
use crate::error::{CausewayError, Result};
use crate::gateway::{quote_ident, DatabaseGateway};

pub struct SqliteGateway {
    path: PathBuf,
    schema: String,
    command_timeout: Duration,
    conn: Option<Connection>,
    in_transaction: bool,
    /// Failure rows that cannot be committed while the writer lock is held
    /// by the open migration transaction; flushed right after ROLLBACK.
    pending_errors: Vec<ScriptErrorRecord>,
}

impl SqliteGateway {
    pub fn new(config: &CausewayConfig) -> Self {
        Self {
            path: PathBuf::from(&config.connection_string),
            schema: config.schema_name.clone(),
            command_timeout: Duration::from_secs(config.command_timeout_secs),
            conn: None,
            in_transaction: false,
            pending_errors: Vec::new(),
        }
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or_else(|| {
            CausewayError::ConfigError("Database connection is not open".to_string())
        })
    }

    fn scripts_run(&self) -> String {
        quote_ident(&format!("{}_{}", self.schema, SCRIPTS_RUN_TABLE))
    }

    fn scripts_run_errors(&self) -> String {
        quote_ident(&format!("{}_{}", self.schema, SCRIPTS_RUN_ERRORS_TABLE))
    }

    fn insert_error(&self, record: &ScriptErrorRecord) -> Result<()> {
        let sql = format!(
            "INSERT INTO {table} (script_name, error_message) VALUES (?1, ?2)",
            table = self.scripts_run_errors(),
        );
        self.conn()?
            .execute(&sql, (&record.script_name, &record.error_message))?;
        Ok(())
    }

    fn flush_pending_errors(&mut self) {
        let pending = std::mem::take(&mut self.pending_errors);
        for record in pending {
            if let Err(e) = self.insert_error(&record) {
                tracing::warn!(script = %record.script_name, error = %e,
                    "Failed to record script failure");
            }
        }
    }
}

#[async_trait]
impl DatabaseGateway for SqliteGateway {
    async fn open(&mut self) -> Result<()> {
        if self.conn.is_none() {
            if let Some(parent) = self.path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let conn = Connection::open(&self.path)?;
            conn.busy_timeout(self.command_timeout)?;
            self.conn = Some(conn);
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            self.in_transaction = false;
            conn.close().map_err(|(_, e)| CausewayError::SqliteError(e))?;
        }
        Ok(())
    }

    async fn ensure_database_exists(&mut self) -> Result<()> {
        // Existence is file creation, which `open` performs.
        Ok(())
    }

    async fn ensure_bookkeeping(&mut self) -> Result<()> {
        let sql = format!(
            r#"
CREATE TABLE IF NOT EXISTS {scripts_run} (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    script_name    TEXT NOT NULL UNIQUE,
    text_of_script TEXT NOT NULL,
    text_hash      TEXT NOT NULL,
    version        TEXT NOT NULL,
    entry_date     TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS {scripts_run_errors} (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    script_name   TEXT NOT NULL,
    error_message TEXT NOT NULL,
    entry_date    TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
            scripts_run = self.scripts_run(),
            scripts_run_errors = self.scripts_run_errors(),
        );
        self.conn()?.execute_batch(&sql)?;
        Ok(())
    }

    async fn begin_transaction(&mut self) -> Result<()> {
        self.conn()?.execute_batch("BEGIN")?;
        self.in_transaction = true;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        if self.in_transaction {
            self.conn()?.execute_batch("COMMIT")?;
            self.in_transaction = false;
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        if self.in_transaction {
            self.conn()?.execute_batch("ROLLBACK")?;
            self.in_transaction = false;
        }
        self.flush_pending_errors();
        Ok(())
    }

    async fn execute(&mut self, sql: &str, _timeout: Duration) -> Result<()> {
        // Statement timeouts are a server-engine concern; the closest SQLite
        // equivalent is the busy timeout applied at open.
        self.conn()?.execute_batch(sql)?;
        Ok(())
    }

    async fn has_run(&mut self, script_name: &str) -> Result<Option<String>> {
        let sql = format!(
            "SELECT text_hash FROM {} WHERE script_name = ?1",
            self.scripts_run()
        );
        let hash = self
            .conn()?
            .query_row(&sql, [script_name], |row| row.get::<_, String>(0))
            .optional()?;
        Ok(hash)
    }

    async fn record_success(&mut self, record: &ScriptRecord) -> Result<()> {
        let sql = format!(
            "INSERT INTO {table} (script_name, text_of_script, text_hash, version) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(script_name) DO UPDATE SET \
                text_of_script = excluded.text_of_script, \
                text_hash = excluded.text_hash, \
                version = excluded.version, \
                entry_date = CURRENT_TIMESTAMP",
            table = self.scripts_run(),
        );
        self.conn()?.execute(
            &sql,
            (
                &record.script_name,
                &record.text_of_script,
                &record.text_hash,
                &record.version,
            ),
        )?;
        Ok(())
    }

    async fn record_failure(&mut self, record: &ScriptErrorRecord) -> Result<()> {
        if self.in_transaction {
            // The open transaction holds the writer lock; defer the insert
            // until after ROLLBACK so the row commits on its own.
            self.pending_errors.push(record.clone());
            Ok(())
        } else {
            self.insert_error(record)
        }
    }
}

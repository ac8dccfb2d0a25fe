//! PostgreSQL gateway: server-based engine with an administrative surface.

use std::time::Duration;

use async_trait::async_trait;
use tokio_postgres::{Client, NoTls};

use crate::bookkeeping::{
    ScriptErrorRecord, ScriptRecord, SCRIPTS_RUN_ERRORS_TABLE, SCRIPTS_RUN_TABLE,
};
use crate::config::CausewayConfig;
use crate::error::{CausewayError, Result};
use crate::gateway::{quote_ident, DatabaseGateway};

pub struct PostgresGateway {
    conn_string: String,
    admin_conn_string: Option<String>,
    schema: String,
    admin_timeout_secs: u64,
    client: Option<Client>,
    in_transaction: bool,
}

impl PostgresGateway {
    pub fn new(config: &CausewayConfig) -> Self {
        Self {
            conn_string: config.connection_string.clone(),
            admin_conn_string: config.admin_connection_string.clone(),
            schema: config.schema_name.clone(),
            admin_timeout_secs: config.admin_command_timeout_secs,
            client: None,
            in_transaction: false,
        }
    }

    fn client(&self) -> Result<&Client> {
        self.client.as_ref().ok_or_else(|| {
            CausewayError::ConfigError("Database connection is not open".to_string())
        })
    }

    fn scripts_run(&self) -> String {
        format!(
            "{}.{}",
            quote_ident(&self.schema),
            quote_ident(SCRIPTS_RUN_TABLE)
        )
    }

    fn scripts_run_errors(&self) -> String {
        format!(
            "{}.{}",
            quote_ident(&self.schema),
            quote_ident(SCRIPTS_RUN_ERRORS_TABLE)
        )
    }
}

/// Connect and spawn the connection driver task on the tokio runtime.
async fn connect(conn_string: &str) -> Result<Client> {
    let (client, connection) = tokio_postgres::connect(conn_string, NoTls).await?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!(error = %e, "Database connection error");
        }
    });
    Ok(client)
}

/// Await a database future under an optional timeout (0 = unlimited).
async fn with_timeout<T>(
    secs: u64,
    fut: impl std::future::Future<Output = std::result::Result<T, tokio_postgres::Error>>,
) -> Result<T> {
    if secs == 0 {
        return Ok(fut.await?);
    }
    match tokio::time::timeout(Duration::from_secs(secs), fut).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(CausewayError::CommandTimeout(secs)),
    }
}

#[async_trait]
impl DatabaseGateway for PostgresGateway {
    async fn open(&mut self) -> Result<()> {
        if self.client.is_none() {
            self.client = Some(connect(&self.conn_string).await?);
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        // Dropping the client tears down the spawned connection task.
        self.client = None;
        self.in_transaction = false;
        Ok(())
    }

    async fn ensure_database_exists(&mut self) -> Result<()> {
        let Some(admin) = self.admin_conn_string.as_deref() else {
            tracing::debug!("No admin connection string, skipping database creation");
            return Ok(());
        };

        let target: tokio_postgres::Config = self.conn_string.parse()?;
        let db_name = target.get_dbname().ok_or_else(|| {
            CausewayError::ConfigError(
                "Connection string does not name a database".to_string(),
            )
        })?;

        let admin_client = connect(admin).await?;
        let rows = admin_client
            .query("SELECT 1 FROM pg_database WHERE datname = $1", &[&db_name])
            .await?;
        if rows.is_empty() {
            tracing::info!(database = %db_name, "Creating database");
            let sql = format!("CREATE DATABASE {}", quote_ident(db_name));
            with_timeout(self.admin_timeout_secs, admin_client.batch_execute(&sql)).await?;
        }
        Ok(())
    }

    async fn ensure_bookkeeping(&mut self) -> Result<()> {
        let sql = format!(
            r#"
CREATE SCHEMA IF NOT EXISTS {schema};

CREATE TABLE IF NOT EXISTS {scripts_run} (
    id             BIGSERIAL PRIMARY KEY,
    script_name    TEXT NOT NULL UNIQUE,
    text_of_script TEXT NOT NULL,
    text_hash      VARCHAR(128) NOT NULL,
    version        TEXT NOT NULL,
    entry_date     TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS {scripts_run_errors} (
    id            BIGSERIAL PRIMARY KEY,
    script_name   TEXT NOT NULL,
    error_message TEXT NOT NULL,
    entry_date    TIMESTAMPTZ NOT NULL DEFAULT now()
);
"#,
            schema = quote_ident(&self.schema),
            scripts_run = self.scripts_run(),
            scripts_run_errors = self.scripts_run_errors(),
        );
        self.client()?.batch_execute(&sql).await?;
        Ok(())
    }

    async fn begin_transaction(&mut self) -> Result<()> {
        self.client()?.batch_execute("BEGIN").await?;
        self.in_transaction = true;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        if self.in_transaction {
            self.client()?.batch_execute("COMMIT").await?;
            self.in_transaction = false;
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        if self.in_transaction {
            self.client()?.batch_execute("ROLLBACK").await?;
            self.in_transaction = false;
        }
        Ok(())
    }

    async fn execute(&mut self, sql: &str, timeout: Duration) -> Result<()> {
        let client = self.client()?;
        with_timeout(timeout.as_secs(), client.batch_execute(sql)).await
    }

    async fn has_run(&mut self, script_name: &str) -> Result<Option<String>> {
        let sql = format!(
            "SELECT text_hash FROM {} WHERE script_name = $1",
            self.scripts_run()
        );
        let rows = self.client()?.query(&sql, &[&script_name]).await?;
        Ok(rows.first().map(|row| row.get(0)))
    }

    async fn record_success(&mut self, record: &ScriptRecord) -> Result<()> {
        let sql = format!(
            "INSERT INTO {table} (script_name, text_of_script, text_hash, version) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (script_name) DO UPDATE SET \
                text_of_script = EXCLUDED.text_of_script, \
                text_hash = EXCLUDED.text_hash, \
                version = EXCLUDED.version, \
                entry_date = now()",
            table = self.scripts_run(),
        );
        self.client()?
            .execute(
                &sql,
                &[
                    &record.script_name,
                    &record.text_of_script,
                    &record.text_hash,
                    &record.version,
                ],
            )
            .await?;
        Ok(())
    }

    async fn record_failure(&mut self, record: &ScriptErrorRecord) -> Result<()> {
        // A dedicated one-shot connection commits this row independently of
        // any live migration transaction.
        let client = connect(&self.conn_string).await?;
        let sql = format!(
            "INSERT INTO {table} (script_name, error_message) VALUES ($1, $2)",
            table = self.scripts_run_errors(),
        );
        client
            .execute(&sql, &[&record.script_name, &record.error_message])
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type DbResult<T> = std::result::Result<T, tokio_postgres::Error>;

    #[tokio::test]
    async fn test_stalled_command_surfaces_as_timeout() {
        let result = with_timeout(1, std::future::pending::<DbResult<()>>()).await;
        assert!(matches!(result, Err(CausewayError::CommandTimeout(1))));
    }

    #[tokio::test]
    async fn test_zero_timeout_means_unlimited() {
        let result = with_timeout(0, std::future::ready(DbResult::Ok(7_u64))).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_fast_command_passes_through() {
        let result = with_timeout(60, std::future::ready(DbResult::Ok(()))).await;
        assert!(result.is_ok());
    }
}

pub mod bookkeeping;
pub mod checksum;
pub mod config;
pub mod environment;
pub mod error;
pub mod folders;
pub mod gateway;
pub mod orchestrator;
pub mod script;

use std::path::Path;

use config::CausewayConfig;
use error::Result;
use gateway::DatabaseGateway;
use orchestrator::Orchestrator;

pub use config::DatabaseType;
pub use environment::Environment;
pub use error::CausewayError;
pub use orchestrator::{MigrationReport, ScriptAction};

/// Main entry point for the Causeway library.
///
/// Create a `Causeway` instance with a validated config and call [`run`]
/// to execute a full migration run.
///
/// [`run`]: Causeway::run
pub struct Causeway {
    pub config: CausewayConfig,
    gateway: Box<dyn DatabaseGateway>,
}

impl Causeway {
    /// Build a runner for the configured engine. Fails fast on
    /// configuration errors, before any database I/O.
    pub fn new(config: CausewayConfig) -> Result<Self> {
        config.validate()?;
        let gateway = gateway::create(&config)?;
        Ok(Self { config, gateway })
    }

    /// Execute a migration run.
    ///
    /// Optionally creates the target database, opens the connection,
    /// delegates to the orchestrator, and releases the connection on every
    /// exit path. Either completes with a report or propagates the
    /// triggering error unchanged.
    pub async fn run(mut self) -> Result<MigrationReport> {
        if self.config.create_database {
            self.gateway.ensure_database_exists().await?;
        }
        self.gateway.open().await?;

        let result = Orchestrator::new(&self.config, self.gateway.as_mut())
            .migrate()
            .await;

        if let Err(close_err) = self.gateway.close().await {
            tracing::warn!(error = %close_err, "Failed to close database connection");
        }

        if let (Ok(report), Some(dir)) = (&result, &self.config.output_directory) {
            if let Err(e) = write_report(dir, report) {
                tracing::warn!(error = %e, "Failed to write migration report");
            }
        }

        result
    }
}

/// Write the run report as JSON into the output directory.
fn write_report(dir: &Path, report: &MigrationReport) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let json = serde_json::to_string_pretty(report).map_err(std::io::Error::other)?;
    std::fs::write(dir.join("migration_report.json"), json)
}

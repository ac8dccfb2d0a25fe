//! The migration run protocol: scan, decide, execute, record.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::bookkeeping::{ScriptErrorRecord, ScriptRecord};
use crate::config::CausewayConfig;
use crate::error::{CausewayError, Result};
use crate::folders::{FolderRole, RunPolicy};
use crate::gateway::DatabaseGateway;
use crate::script::{self, ScriptFile};

/// What happened to one script during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptAction {
    Applied,
    /// A changed run-once script re-applied under the drift override.
    Reapplied,
    Skipped,
}

#[derive(Debug, Serialize)]
pub struct ScriptOutcome {
    pub folder: String,
    pub script: String,
    pub action: ScriptAction,
    pub execution_time_ms: u64,
}

/// Report returned after a successful run.
#[derive(Debug, Serialize)]
pub struct MigrationReport {
    pub started_at: DateTime<Utc>,
    pub applied: usize,
    pub skipped: usize,
    pub total_time_ms: u64,
    pub details: Vec<ScriptOutcome>,
}

impl MigrationReport {
    fn new() -> Self {
        Self {
            started_at: Utc::now(),
            applied: 0,
            skipped: 0,
            total_time_ms: 0,
            details: Vec::new(),
        }
    }
}

/// Drives one migration run against an open gateway.
///
/// Scripts execute strictly sequentially: within a folder in ascending
/// order-key order, folders in their fixed processing order. The first
/// execution failure aborts the entire run.
pub struct Orchestrator<'a> {
    config: &'a CausewayConfig,
    gateway: &'a mut dyn DatabaseGateway,
}

impl<'a> Orchestrator<'a> {
    pub fn new(config: &'a CausewayConfig, gateway: &'a mut dyn DatabaseGateway) -> Self {
        Self { config, gateway }
    }

    /// Run the full migration protocol.
    ///
    /// The whole script tree is scanned and validated before any database
    /// work, so configuration errors (duplicate order keys, unparseable
    /// names) in a late folder never leave an earlier folder's scripts
    /// applied. On failure the main transaction (if any) is rolled back and
    /// the triggering error is re-surfaced unchanged; the failure row in
    /// the error table survives the rollback.
    pub async fn migrate(&mut self) -> Result<MigrationReport> {
        let catalog = self.build_catalog()?;

        self.gateway.ensure_bookkeeping().await?;

        if self.config.transaction {
            self.gateway.begin_transaction().await?;
        }

        match self.run_folders(&catalog).await {
            Ok(report) => {
                self.gateway.commit().await?;
                tracing::info!(
                    applied = report.applied,
                    skipped = report.skipped,
                    total_time_ms = report.total_time_ms,
                    "Migration run complete"
                );
                Ok(report)
            }
            Err(e) => {
                if let Err(rollback_err) = self.gateway.rollback().await {
                    tracing::warn!(error = %rollback_err, "Failed to roll back migration transaction");
                }
                tracing::error!(error = %e, "Migration run aborted");
                Err(e)
            }
        }
    }

    /// Scan every folder into an in-memory catalog, in processing order.
    /// All script-tree validation happens here, before any execution.
    fn build_catalog(&self) -> Result<Vec<(FolderRole, Vec<ScriptFile>)>> {
        let mut catalog = Vec::new();
        for role in FolderRole::ordered() {
            let scripts = script::discover(
                &self.config.sql_files_directory,
                role,
                &self.config.environments,
            )?;
            if !scripts.is_empty() {
                catalog.push((role, scripts));
            }
        }
        Ok(catalog)
    }

    async fn run_folders(
        &mut self,
        catalog: &[(FolderRole, Vec<ScriptFile>)],
    ) -> Result<MigrationReport> {
        let mut report = MigrationReport::new();

        for (role, scripts) in catalog {
            let role = *role;
            tracing::info!(folder = %role, count = scripts.len(), "Processing folder");

            for script in scripts {
                let started = Instant::now();
                let action = match role.policy() {
                    RunPolicy::EveryTime => {
                        self.run_script(role, script).await?;
                        ScriptAction::Applied
                    }
                    RunPolicy::Once => self.run_once_script(role, script).await?,
                };

                let elapsed = started.elapsed().as_millis() as u64;
                match action {
                    ScriptAction::Skipped => report.skipped += 1,
                    _ => {
                        report.applied += 1;
                        report.total_time_ms += elapsed;
                    }
                }
                report.details.push(ScriptOutcome {
                    folder: role.dir_name().to_string(),
                    script: script.name.clone(),
                    action,
                    execution_time_ms: elapsed,
                });
            }
        }

        Ok(report)
    }

    /// Decide and run one checksum-gated script.
    async fn run_once_script(
        &mut self,
        role: FolderRole,
        script: &ScriptFile,
    ) -> Result<ScriptAction> {
        match self.gateway.has_run(&script.name).await? {
            None => {
                self.run_script(role, script).await?;
                self.record_success(script).await?;
                Ok(ScriptAction::Applied)
            }
            Some(recorded) if recorded == script.checksum => {
                tracing::debug!(script = %script.name, "Already applied, skipping");
                Ok(ScriptAction::Skipped)
            }
            Some(recorded) => {
                if !self.config.rerun_changed_once_scripts {
                    return Err(CausewayError::ScriptChanged {
                        script: script.name.clone(),
                        recorded,
                        current: script.checksum.clone(),
                    });
                }
                tracing::warn!(script = %script.name, "One-time script changed, re-applying");
                self.run_script(role, script).await?;
                self.record_success(script).await?;
                Ok(ScriptAction::Reapplied)
            }
        }
    }

    /// Execute one script; on failure, durably record it and abort.
    async fn run_script(&mut self, role: FolderRole, script: &ScriptFile) -> Result<()> {
        tracing::info!(folder = %role, script = %script.name, "Running script");
        let timeout = Duration::from_secs(self.config.command_timeout_secs);

        if let Err(e) = self.gateway.execute(&script.sql, timeout).await {
            let reason = e.to_string();
            let record = ScriptErrorRecord {
                script_name: script.name.clone(),
                error_message: reason.clone(),
            };
            if let Err(record_err) = self.gateway.record_failure(&record).await {
                tracing::warn!(script = %script.name, error = %record_err,
                    "Failed to record script failure");
            }
            return Err(CausewayError::ScriptFailed {
                script: script.name.clone(),
                reason,
            });
        }
        Ok(())
    }

    async fn record_success(&mut self, script: &ScriptFile) -> Result<()> {
        self.gateway
            .record_success(&ScriptRecord {
                script_name: script.name.clone(),
                text_of_script: script.sql.clone(),
                text_hash: script.checksum.clone(),
                version: self.config.version.clone(),
            })
            .await
    }
}

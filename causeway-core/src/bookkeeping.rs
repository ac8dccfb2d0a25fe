//! Persisted bookkeeping rows: applied scripts and failed attempts.
//!
//! Each engine owns the DDL and SQL dialect for these tables; the row shapes
//! here are what the orchestrator reads and writes through the gateway.

/// One row per successfully applied run-once script. The applied timestamp
/// is assigned by the database when the row is written.
#[derive(Debug, Clone)]
pub struct ScriptRecord {
    pub script_name: String,
    pub text_of_script: String,
    pub text_hash: String,
    pub version: String,
}

/// One row per failed execution attempt. Append-only; written through an
/// independently committed scope so it survives rollback of the migration
/// transaction.
#[derive(Debug, Clone)]
pub struct ScriptErrorRecord {
    pub script_name: String,
    pub error_message: String,
}

/// Table name for applied run-once scripts.
pub const SCRIPTS_RUN_TABLE: &str = "scripts_run";

/// Table name for the append-only error log.
pub const SCRIPTS_RUN_ERRORS_TABLE: &str = "scripts_run_errors";

mod output;

use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use causeway_core::config::{CausewayConfig, DatabaseType};
use causeway_core::error::CausewayError;
use causeway_core::{Causeway, Environment};

/// Accept the bare-flag and explicit boolean spellings: true/false/1/0.
fn parse_flexible_bool(s: &str) -> Result<bool, String> {
    match s.to_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(format!("'{}' is not a boolean (use true/false/1/0)", s)),
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "causeway",
    about = "Folder-based SQL migration runner for PostgreSQL and SQLite",
    disable_version_flag = true
)]
struct Cli {
    /// Connection string for the target database (file path for SQLite)
    #[arg(
        short = 'c',
        long = "connectionstring",
        aliases = ["connstring", "cs"],
        value_name = "CONNSTRING"
    )]
    connection_string: Option<String>,

    /// Administrative connection string, used to create the database
    #[arg(
        short = 'a',
        long = "adminconnectionstring",
        aliases = ["adminconnstring", "acs", "csa"],
        value_name = "CONNSTRING"
    )]
    admin_connection_string: Option<String>,

    /// Database engine: postgresql or sqlite
    #[arg(long = "databasetype", alias = "dbt", value_name = "TYPE", default_value = "postgresql")]
    database_type: String,

    /// Root directory holding the migration folders
    #[arg(short = 'f', long = "files", alias = "sqlfilesdirectory", value_name = "PATH")]
    sql_files_directory: Option<PathBuf>,

    /// Output directory for run artifacts
    #[arg(short = 'o', long = "output", alias = "outputpath", value_name = "PATH")]
    output: Option<PathBuf>,

    /// Version tag stamped onto applied-script records
    #[arg(long = "version", value_name = "VERSION")]
    version: Option<String>,

    /// Schema for the bookkeeping tables
    #[arg(long = "schemaname", aliases = ["schema", "sc"], value_name = "SCHEMA", default_value = "causeway")]
    schema_name: String,

    /// Command timeout for ordinary scripts, in seconds
    #[arg(long = "commandtimeout", alias = "ct", value_name = "SECONDS")]
    command_timeout: Option<u64>,

    /// Command timeout for administrative operations, in seconds
    #[arg(long = "admincommandtimeout", alias = "cta", value_name = "SECONDS")]
    admin_command_timeout: Option<u64>,

    /// Wrap the whole run in a single transaction
    #[arg(
        short = 't',
        long = "transaction",
        alias = "trx",
        value_name = "TRUE|FALSE",
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = parse_flexible_bool
    )]
    transaction: Option<bool>,

    /// Environments this run targets; tagged scripts outside them are skipped
    #[arg(
        long = "environment",
        aliases = ["env", "environments"],
        value_name = "ENV",
        num_args = 1..
    )]
    environments: Vec<String>,

    /// Do not create the target database if it is missing
    #[arg(long = "donotcreatedatabase")]
    do_not_create_database: bool,

    /// Re-apply one-time scripts whose content has changed
    #[arg(long = "rerunoncescripts")]
    rerun_once_scripts: bool,

    /// Suppress non-essential output
    #[arg(
        long = "silent",
        value_name = "TRUE|FALSE",
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = parse_flexible_bool
    )]
    silent: Option<bool>,

    /// Run without prompting (implies silent)
    #[arg(
        long = "noninteractive",
        alias = "ni",
        value_name = "TRUE|FALSE",
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = parse_flexible_bool
    )]
    noninteractive: Option<bool>,

    /// Output the run report as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose/debug output
    #[arg(short, long)]
    verbose: bool,
}

fn build_config(cli: &Cli) -> Result<CausewayConfig, CausewayError> {
    let database_type: DatabaseType = cli.database_type.parse()?;

    let connection_string = cli.connection_string.clone().ok_or_else(|| {
        CausewayError::ConfigError(
            "Connection string is required (-c/--connectionstring)".to_string(),
        )
    })?;

    let sql_files_directory = cli.sql_files_directory.clone().ok_or_else(|| {
        CausewayError::ConfigError(
            "SQL files directory is required (-f/--files)".to_string(),
        )
    })?;

    let defaults = CausewayConfig::default();
    let config = CausewayConfig {
        connection_string,
        admin_connection_string: cli.admin_connection_string.clone(),
        database_type,
        sql_files_directory,
        output_directory: cli.output.clone(),
        version: cli.version.clone().unwrap_or(defaults.version),
        schema_name: cli.schema_name.clone(),
        command_timeout_secs: cli.command_timeout.unwrap_or(defaults.command_timeout_secs),
        admin_command_timeout_secs: cli
            .admin_command_timeout
            .unwrap_or(defaults.admin_command_timeout_secs),
        transaction: cli.transaction.unwrap_or(false),
        environments: cli
            .environments
            .iter()
            .map(|e| Environment::new(e.as_str()))
            .collect(),
        create_database: !cli.do_not_create_database,
        rerun_changed_once_scripts: cli.rerun_once_scripts,
        silent: cli.silent.unwrap_or(false) || cli.noninteractive.unwrap_or(false),
    };
    config.validate()?;
    Ok(config)
}

/// Map error types to differentiated exit codes.
fn exit_code(error: &CausewayError) -> i32 {
    match error {
        CausewayError::ConfigError(_)
        | CausewayError::InvalidScriptName(_)
        | CausewayError::DuplicateOrderKey { .. } => 2,
        CausewayError::ScriptChanged { .. } => 3,
        CausewayError::PostgresError(_)
        | CausewayError::SqliteError(_)
        | CausewayError::IoError(_) => 4,
        CausewayError::ScriptFailed { .. } | CausewayError::CommandTimeout(_) => 5,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Set up logging (suppressed when JSON output is requested)
    let filter = if cli.json {
        "error"
    } else if cli.verbose {
        "debug"
    } else if cli.silent.unwrap_or(false) || cli.noninteractive.unwrap_or(false) {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .without_time()
        .init();

    if let Err(e) = run(cli).await {
        output::print_error(&e);
        process::exit(exit_code(&e));
    }
}

async fn run(cli: Cli) -> Result<(), CausewayError> {
    let json_output = cli.json;
    let config = build_config(&cli)?;

    let report = Causeway::new(config)?.run().await?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&report).unwrap());
    } else {
        output::print_report(&report);
    }
    Ok(())
}

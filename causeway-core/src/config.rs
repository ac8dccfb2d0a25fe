use std::fmt;
use std::path::PathBuf;

use crate::environment::Environment;
use crate::error::{CausewayError, Result};

/// Supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseType {
    /// Server-based engine with a separate administrative surface.
    Postgres,
    /// Embedded file-based engine; database existence is file existence.
    Sqlite,
}

impl std::str::FromStr for DatabaseType {
    type Err = CausewayError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgresql" | "postgres" | "pg" => Ok(DatabaseType::Postgres),
            "sqlite" | "sqlite3" => Ok(DatabaseType::Sqlite),
            _ => Err(CausewayError::ConfigError(format!(
                "Unknown database type '{}'. Use 'postgresql' or 'sqlite'.",
                s
            ))),
        }
    }
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseType::Postgres => write!(f, "postgresql"),
            DatabaseType::Sqlite => write!(f, "sqlite"),
        }
    }
}

/// Immutable input to a migration run. Constructed once before the run
/// starts, never mutated during it.
#[derive(Clone)]
pub struct CausewayConfig {
    /// Connection string for the target database. For SQLite this is the
    /// database file path.
    pub connection_string: String,
    /// Administrative connection string, used only to create the target
    /// database when it does not exist yet.
    pub admin_connection_string: Option<String>,
    pub database_type: DatabaseType,
    /// Root directory holding the migration folder tree.
    pub sql_files_directory: PathBuf,
    pub output_directory: Option<PathBuf>,
    /// Version tag stamped onto applied-script records.
    pub version: String,
    /// Schema holding the bookkeeping tables.
    pub schema_name: String,
    /// Per-statement timeout for ordinary script execution, in seconds.
    pub command_timeout_secs: u64,
    /// Timeout for administrative operations (database creation), in seconds.
    pub admin_command_timeout_secs: u64,
    /// Wrap the whole run in a single transaction.
    pub transaction: bool,
    pub environments: Vec<Environment>,
    /// Create the target database if it is absent.
    pub create_database: bool,
    /// Re-apply changed run-once scripts instead of failing on drift.
    pub rerun_changed_once_scripts: bool,
    pub silent: bool,
}

impl Default for CausewayConfig {
    fn default() -> Self {
        Self {
            connection_string: String::new(),
            admin_connection_string: None,
            database_type: DatabaseType::Postgres,
            sql_files_directory: PathBuf::from("db"),
            output_directory: None,
            version: "0.0.0".to_string(),
            schema_name: "causeway".to_string(),
            command_timeout_secs: 60,
            admin_command_timeout_secs: 300,
            transaction: false,
            environments: Vec::new(),
            create_database: true,
            rerun_changed_once_scripts: false,
            silent: false,
        }
    }
}

impl fmt::Debug for CausewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CausewayConfig")
            .field("connection_string", &"[REDACTED]")
            .field(
                "admin_connection_string",
                &self.admin_connection_string.as_ref().map(|_| "[REDACTED]"),
            )
            .field("database_type", &self.database_type)
            .field("sql_files_directory", &self.sql_files_directory)
            .field("output_directory", &self.output_directory)
            .field("version", &self.version)
            .field("schema_name", &self.schema_name)
            .field("command_timeout_secs", &self.command_timeout_secs)
            .field("admin_command_timeout_secs", &self.admin_command_timeout_secs)
            .field("transaction", &self.transaction)
            .field("environments", &self.environments)
            .field("create_database", &self.create_database)
            .field("rerun_changed_once_scripts", &self.rerun_changed_once_scripts)
            .field("silent", &self.silent)
            .finish()
    }
}

/// Validate that a SQL identifier contains only safe characters.
///
/// Identifiers are still quoted when interpolated; this rejects suspicious
/// names before any database I/O happens.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(CausewayError::ConfigError(
            "Identifier cannot be empty".to_string(),
        ));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(CausewayError::ConfigError(format!(
            "Identifier '{}' contains invalid characters. Only [a-zA-Z0-9_] are allowed.",
            name
        )));
    }
    Ok(())
}

impl CausewayConfig {
    /// Check required settings before any database I/O.
    pub fn validate(&self) -> Result<()> {
        if self.connection_string.is_empty() {
            return Err(CausewayError::ConfigError(
                "Connection string is required".to_string(),
            ));
        }
        if self.sql_files_directory.as_os_str().is_empty() {
            return Err(CausewayError::ConfigError(
                "SQL files directory is required".to_string(),
            ));
        }
        validate_identifier(&self.schema_name)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_defaults() {
        let config = CausewayConfig::default();
        assert_eq!(config.schema_name, "causeway");
        assert_eq!(config.command_timeout_secs, 60);
        assert_eq!(config.admin_command_timeout_secs, 300);
        assert!(!config.transaction);
        assert!(config.create_database);
        assert!(!config.rerun_changed_once_scripts);
        assert!(config.environments.is_empty());
    }

    #[test]
    fn test_validate_requires_connection_string() {
        let config = CausewayConfig::default();
        assert!(matches!(
            config.validate(),
            Err(CausewayError::ConfigError(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_schema_name() {
        let config = CausewayConfig {
            connection_string: "host=localhost".to_string(),
            schema_name: "bad;drop".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_complete_config() {
        let config = CausewayConfig {
            connection_string: "host=localhost user=x dbname=y".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_database_type_parsing() {
        assert_eq!(
            DatabaseType::from_str("PostgreSQL").unwrap(),
            DatabaseType::Postgres
        );
        assert_eq!(
            DatabaseType::from_str("sqlite3").unwrap(),
            DatabaseType::Sqlite
        );
        assert!(DatabaseType::from_str("oracle").is_err());
    }

    #[test]
    fn test_debug_redacts_connection_strings() {
        let config = CausewayConfig {
            connection_string: "host=localhost password=hunter2".to_string(),
            admin_connection_string: Some("password=hunter2".to_string()),
            ..Default::default()
        };
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("[REDACTED]"));
    }
}

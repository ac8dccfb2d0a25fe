use thiserror::Error;

/// Extract the full error message from a tokio_postgres::Error,
/// including the underlying DbError details that Display hides.
pub fn format_db_error(e: &tokio_postgres::Error) -> String {
    // The source chain contains the actual DbError with message/detail/hint
    if let Some(db_err) = e.as_db_error() {
        let mut msg = db_err.message().to_string();
        if let Some(detail) = db_err.detail() {
            msg.push_str(&format!("\n  Detail: {}", detail));
        }
        if let Some(hint) = db_err.hint() {
            msg.push_str(&format!("\n  Hint: {}", hint));
        }
        if let Some(position) = db_err.position() {
            msg.push_str(&format!("\n  Position: {:?}", position));
        }
        return msg;
    }
    // Fallback: walk the source chain
    let mut msg = e.to_string();
    let mut source = std::error::Error::source(e);
    while let Some(s) = source {
        msg.push_str(&format!(": {}", s));
        source = s.source();
    }
    msg
}

#[derive(Error, Debug)]
pub enum CausewayError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Database error: {}", format_db_error(.0))]
    PostgresError(#[from] tokio_postgres::Error),

    #[error("Database error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    #[error("Invalid script name '{0}': expected <order>_<name>[.<ENV>].sql")]
    InvalidScriptName(String),

    #[error("Duplicate order key {order} in folder '{folder}': '{first}' and '{second}'")]
    DuplicateOrderKey {
        folder: String,
        order: u64,
        first: String,
        second: String,
    },

    #[error(
        "Script '{script}' has changed since it was applied: recorded hash {recorded}, current hash {current}. \
         One-time scripts must not change; pass --rerunoncescripts to re-apply it anyway."
    )]
    ScriptChanged {
        script: String,
        recorded: String,
        current: String,
    },

    #[error("Script '{script}' failed: {reason}")]
    ScriptFailed { script: String, reason: String },

    #[error("Statement did not complete within {0} seconds")]
    CommandTimeout(u64),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CausewayError>;

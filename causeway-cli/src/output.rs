use colored::Colorize;

use causeway_core::error::CausewayError;
use causeway_core::{MigrationReport, ScriptAction};

/// Print a run report summary.
pub fn print_report(report: &MigrationReport) {
    if report.applied == 0 {
        println!("{}", "Database is up to date. No scripts applied.".green());
    } else {
        println!(
            "{}",
            format!(
                "Successfully applied {} script(s) (execution time {}ms)",
                report.applied, report.total_time_ms
            )
            .green()
            .bold()
        );
    }

    for detail in &report.details {
        let marker = match detail.action {
            ScriptAction::Applied => "→".green(),
            ScriptAction::Reapplied => "↻".yellow(),
            ScriptAction::Skipped => "·".dimmed(),
        };
        println!(
            "  {} {}/{} ({}ms)",
            marker, detail.folder, detail.script, detail.execution_time_ms
        );
    }

    if report.skipped > 0 {
        println!(
            "{}",
            format!("{} script(s) already applied and skipped.", report.skipped).dimmed()
        );
    }
}

pub fn print_error(error: &CausewayError) {
    eprintln!("{} {}", "ERROR:".red().bold(), error);

    // Provide actionable guidance
    match error {
        CausewayError::ConfigError(_) => {
            eprintln!(
                "{}",
                "Hint: Pass -c/--connectionstring and -f/--files, and check the remaining flags."
                    .dimmed()
            );
        }
        CausewayError::ScriptChanged { .. } => {
            eprintln!(
                "{}",
                "Hint: Restore the original script content, or pass --rerunoncescripts to re-apply it."
                    .dimmed()
            );
        }
        CausewayError::ScriptFailed { .. } => {
            eprintln!(
                "{}",
                "Hint: The run was aborted; inspect the scripts_run_errors table for detail."
                    .dimmed()
            );
        }
        CausewayError::PostgresError(_) | CausewayError::SqliteError(_) => {
            eprintln!(
                "{}",
                "Hint: Verify the database is reachable and the connection details are correct."
                    .dimmed()
            );
        }
        _ => {}
    }
}

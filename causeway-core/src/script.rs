//! Script file discovery, naming convention parsing, and ordering.
//!
//! Files are named `<order>_<descriptive-name>[.<ENV>...].sql`. The numeric
//! prefix determines execution order within a folder; optional environment
//! tags between the stem and the extension restrict applicability.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::checksum;
use crate::environment::{self, Environment};
use crate::error::{CausewayError, Result};
use crate::folders::{FolderRole, RunPolicy};

static ORDERED_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)[-_](.+)$").unwrap());

/// A single migration unit discovered on disk.
#[derive(Debug, Clone)]
pub struct ScriptFile {
    /// Full filename, e.g. `0010_add_users.LOCAL.sql`.
    pub name: String,
    /// Numeric prefix; execution order within the folder.
    pub order_key: u64,
    /// Environment tags from the filename; empty means unrestricted.
    pub environments: Vec<Environment>,
    /// Content hash (line-ending normalized).
    pub checksum: String,
    /// Raw script text.
    pub sql: String,
}

/// Parse a script filename into its order key and environment tags.
pub fn parse_script_filename(filename: &str) -> Result<(u64, Vec<Environment>)> {
    let stem = filename
        .strip_suffix(".sql")
        .ok_or_else(|| CausewayError::InvalidScriptName(filename.to_string()))?;

    let mut parts = stem.split('.');
    let base = parts.next().unwrap_or_default();
    let environments: Vec<Environment> = parts.map(Environment::new).collect();

    let caps = ORDERED_NAME_RE
        .captures(base)
        .ok_or_else(|| CausewayError::InvalidScriptName(filename.to_string()))?;

    let order_key: u64 = caps
        .get(1)
        .unwrap()
        .as_str()
        .parse()
        .map_err(|_| CausewayError::InvalidScriptName(filename.to_string()))?;

    Ok((order_key, environments))
}

/// Discover the scripts for one folder role under the script root.
///
/// Returns the surviving scripts sorted by order key ascending (numeric, so
/// `10_x` sorts after `2_x`). A missing directory yields an empty list.
/// Duplicate order keys within a run-once folder are a configuration error.
pub fn discover(
    root: &Path,
    role: FolderRole,
    active_environments: &[Environment],
) -> Result<Vec<ScriptFile>> {
    let dir = root.join(role.dir_name());
    if !dir.is_dir() {
        tracing::debug!(folder = %role, "Folder not present, nothing to run");
        return Ok(Vec::new());
    }

    let mut scripts = Vec::new();
    for entry in std::fs::read_dir(&dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let filename = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => continue,
        };
        if !filename.ends_with(".sql") {
            continue;
        }

        let (order_key, environments) = parse_script_filename(&filename)?;

        if !environment::applies(&environments, active_environments) {
            tracing::debug!(script = %filename, "Skipping script for other environment");
            continue;
        }

        let sql = std::fs::read_to_string(&path)?;
        let checksum = checksum::hash(&sql);

        scripts.push(ScriptFile {
            name: filename,
            order_key,
            environments,
            checksum,
            sql,
        });
    }

    scripts.sort_by(|a, b| (a.order_key, &a.name).cmp(&(b.order_key, &b.name)));

    if role.policy() == RunPolicy::Once {
        for pair in scripts.windows(2) {
            if pair[0].order_key == pair[1].order_key {
                return Err(CausewayError::DuplicateOrderKey {
                    folder: role.dir_name().to_string(),
                    order: pair[0].order_key,
                    first: pair[0].name.clone(),
                    second: pair[1].name.clone(),
                });
            }
        }
    }

    Ok(scripts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_filename() {
        let (order, envs) = parse_script_filename("1_create_users.sql").unwrap();
        assert_eq!(order, 1);
        assert!(envs.is_empty());
    }

    #[test]
    fn test_parse_dash_separator() {
        let (order, _) = parse_script_filename("0042-add_index.sql").unwrap();
        assert_eq!(order, 42);
    }

    #[test]
    fn test_parse_environment_tags() {
        let (order, envs) = parse_script_filename("2_seed_data.LOCAL.TEST.sql").unwrap();
        assert_eq!(order, 2);
        assert_eq!(envs, vec![Environment::new("LOCAL"), Environment::new("TEST")]);
    }

    #[test]
    fn test_parse_rejects_missing_order_prefix() {
        assert!(parse_script_filename("create_users.sql").is_err());
        assert!(parse_script_filename("_create_users.sql").is_err());
    }

    #[test]
    fn test_parse_rejects_non_sql() {
        assert!(parse_script_filename("1_create_users.txt").is_err());
    }

    #[test]
    fn test_discover_missing_directory_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let scripts = discover(tmp.path(), FolderRole::Up, &[]).unwrap();
        assert!(scripts.is_empty());
    }

    #[test]
    fn test_discover_numeric_ordering() {
        let tmp = tempfile::tempdir().unwrap();
        let up = tmp.path().join("up");
        std::fs::create_dir(&up).unwrap();
        std::fs::write(up.join("10_ten.sql"), "SELECT 10;").unwrap();
        std::fs::write(up.join("2_two.sql"), "SELECT 2;").unwrap();
        std::fs::write(up.join("1_one.sql"), "SELECT 1;").unwrap();

        let scripts = discover(tmp.path(), FolderRole::Up, &[]).unwrap();
        let names: Vec<_> = scripts.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["1_one.sql", "2_two.sql", "10_ten.sql"]);
    }

    #[test]
    fn test_discover_filters_by_environment() {
        let tmp = tempfile::tempdir().unwrap();
        let up = tmp.path().join("up");
        std::fs::create_dir(&up).unwrap();
        std::fs::write(up.join("1_everywhere.sql"), "SELECT 1;").unwrap();
        std::fs::write(up.join("2_local_only.LOCAL.sql"), "SELECT 2;").unwrap();
        std::fs::write(up.join("3_prod_only.PROD.sql"), "SELECT 3;").unwrap();

        let active = vec![Environment::new("local")];
        let scripts = discover(tmp.path(), FolderRole::Up, &active).unwrap();
        let names: Vec<_> = scripts.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["1_everywhere.sql", "2_local_only.LOCAL.sql"]);
    }

    #[test]
    fn test_discover_ignores_non_sql_files() {
        let tmp = tempfile::tempdir().unwrap();
        let up = tmp.path().join("up");
        std::fs::create_dir(&up).unwrap();
        std::fs::write(up.join("1_real.sql"), "SELECT 1;").unwrap();
        std::fs::write(up.join("notes.md"), "not a script").unwrap();

        let scripts = discover(tmp.path(), FolderRole::Up, &[]).unwrap();
        assert_eq!(scripts.len(), 1);
    }

    #[test]
    fn test_discover_duplicate_order_in_run_once_folder_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let up = tmp.path().join("up");
        std::fs::create_dir(&up).unwrap();
        std::fs::write(up.join("1_first.sql"), "SELECT 1;").unwrap();
        std::fs::write(up.join("1_second.sql"), "SELECT 2;").unwrap();

        let err = discover(tmp.path(), FolderRole::Up, &[]).unwrap_err();
        assert!(matches!(err, CausewayError::DuplicateOrderKey { order: 1, .. }));
    }

    #[test]
    fn test_discover_duplicate_order_allowed_in_every_time_folder() {
        let tmp = tempfile::tempdir().unwrap();
        let views = tmp.path().join("views");
        std::fs::create_dir(&views).unwrap();
        std::fs::write(views.join("1_a_view.sql"), "SELECT 1;").unwrap();
        std::fs::write(views.join("1_b_view.sql"), "SELECT 2;").unwrap();

        let scripts = discover(tmp.path(), FolderRole::Views, &[]).unwrap();
        assert_eq!(scripts.len(), 2);
    }

    #[test]
    fn test_discover_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let up = tmp.path().join("up");
        std::fs::create_dir(&up).unwrap();
        std::fs::write(up.join("1_one.sql"), "SELECT 1;").unwrap();

        let first = discover(tmp.path(), FolderRole::Up, &[]).unwrap();
        let second = discover(tmp.path(), FolderRole::Up, &[]).unwrap();
        assert_eq!(first.len(), second.len());
        assert_eq!(first[0].checksum, second[0].checksum);
    }
}

//! The closed set of migration folder roles and their processing order.

use std::fmt;

/// Re-run policy for a folder role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPolicy {
    /// Applied at most once per unchanged checksum; tracked in bookkeeping.
    Once,
    /// Re-applied on every migration run, never checksum-gated.
    EveryTime,
}

/// A named folder role under the script root.
///
/// The set of roles and the order they are processed in is fixed; directory
/// listing order never influences it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderRole {
    BeforeMigration,
    Structure,
    Up,
    RunFirst,
    Functions,
    Views,
    Sprocs,
    Triggers,
    Indexes,
    AfterEveryTime,
    Permissions,
}

impl FolderRole {
    /// All roles in their fixed processing order.
    pub const fn ordered() -> [FolderRole; 11] {
        use FolderRole::*;
        [
            BeforeMigration,
            Structure,
            Up,
            RunFirst,
            Functions,
            Views,
            Sprocs,
            Triggers,
            Indexes,
            AfterEveryTime,
            Permissions,
        ]
    }

    /// Directory name under the script root.
    pub fn dir_name(self) -> &'static str {
        use FolderRole::*;
        match self {
            BeforeMigration => "beforeMigration",
            Structure => "structure",
            Up => "up",
            RunFirst => "runFirst",
            Functions => "functions",
            Views => "views",
            Sprocs => "sprocs",
            Triggers => "triggers",
            Indexes => "indexes",
            AfterEveryTime => "afterEveryTime",
            Permissions => "permissions",
        }
    }

    pub fn policy(self) -> RunPolicy {
        use FolderRole::*;
        match self {
            Structure | Up | RunFirst => RunPolicy::Once,
            BeforeMigration | Functions | Views | Sprocs | Triggers | Indexes
            | AfterEveryTime | Permissions => RunPolicy::EveryTime,
        }
    }
}

impl fmt::Display for FolderRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_up_runs_before_views_and_permissions_last() {
        let order = FolderRole::ordered();
        let pos = |r| order.iter().position(|&x| x == r).unwrap();
        assert!(pos(FolderRole::BeforeMigration) < pos(FolderRole::Up));
        assert!(pos(FolderRole::Up) < pos(FolderRole::Views));
        assert_eq!(pos(FolderRole::Permissions), order.len() - 1);
    }

    #[test]
    fn test_policies() {
        assert_eq!(FolderRole::Up.policy(), RunPolicy::Once);
        assert_eq!(FolderRole::Structure.policy(), RunPolicy::Once);
        assert_eq!(FolderRole::RunFirst.policy(), RunPolicy::Once);
        assert_eq!(FolderRole::Views.policy(), RunPolicy::EveryTime);
        assert_eq!(FolderRole::Permissions.policy(), RunPolicy::EveryTime);
    }

    #[test]
    fn test_every_role_has_a_distinct_directory() {
        let order = FolderRole::ordered();
        for (i, a) in order.iter().enumerate() {
            for b in &order[i + 1..] {
                assert_ne!(a.dir_name(), b.dir_name());
            }
        }
    }
}

use std::fmt;

/// A named environment tag (e.g. LOCAL, TEST, PROD).
///
/// Scripts may be qualified to one or more environments through their
/// filename; an unqualified script applies everywhere. Matching is
/// case-insensitive, so `local` and `LOCAL` are the same environment.
#[derive(Debug, Clone, Eq)]
pub struct Environment(String);

impl Environment {
    pub fn new(name: impl Into<String>) -> Self {
        Environment(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl PartialEq for Environment {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether a script with the given tags applies under the active
/// environment set. No tags means the script applies everywhere; a tagged
/// script applies only when its tags intersect the active set.
pub fn applies(script_tags: &[Environment], active: &[Environment]) -> bool {
    if script_tags.is_empty() {
        return true;
    }
    script_tags.iter().any(|tag| active.contains(tag))
}

//! Authorization for the directory: a fixed allow-list of directory groups.

use std::collections::BTreeSet;

/// Groups whose members may use the directory. Matching is exact and
/// case-sensitive.
pub const ALLOWED_GROUPS: [&str; 3] = ["Domain Admins", "sys.admins", "Administration"];

#[derive(Clone, Debug)]
pub struct AccessPolicy {
    allowed: BTreeSet<String>,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self {
            allowed: ALLOWED_GROUPS.iter().map(|g| g.to_string()).collect(),
        }
    }
}

impl AccessPolicy {
    /// True when at least one of `groups` is on the allow-list.
    pub fn is_allowed<I, S>(&self, groups: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        groups
            .into_iter()
            .any(|group| self.allowed.contains(group.as_ref()))
    }

    pub fn allowed_groups(&self) -> impl Iterator<Item = &str> {
        self.allowed.iter().map(String::as_str)
    }
}

/// [`AccessPolicy::is_allowed`] against the default allow-list.
pub fn is_allowed<I, S>(groups: I) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    AccessPolicy::default().is_allowed(groups)
}

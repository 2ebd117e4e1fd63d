//! # Scope Filter
//!
//! Namespaces the controller never reconciles or fans out into.

use std::collections::BTreeSet;

/// Predicate over namespaces built from configuration
#[derive(Debug, Clone, Default)]
pub struct ScopeFilter {
    excluded: BTreeSet<String>,
}

impl ScopeFilter {
    pub fn new<I, S>(excluded: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            excluded: excluded.into_iter().map(Into::into).collect(),
        }
    }

    /// Filter that excludes nothing
    #[must_use]
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn is_excluded_scope(&self, namespace: &str) -> bool {
        self.excluded.contains(namespace)
    }

    pub fn excluded(&self) -> impl Iterator<Item = &str> {
        self.excluded.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excluded_scopes() {
        let filter = ScopeFilter::new(["kube-system", "local-path-storage"]);
        assert!(filter.is_excluded_scope("kube-system"));
        assert!(filter.is_excluded_scope("local-path-storage"));
        assert!(!filter.is_excluded_scope("default"));
    }

    #[test]
    fn test_allow_all() {
        assert!(!ScopeFilter::allow_all().is_excluded_scope("kube-system"));
    }
}

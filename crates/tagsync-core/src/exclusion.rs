//! Organizations the controller ignores entirely.
use std::collections::HashSet;

/// Fixed set of excluded organizations, built once at startup.
///
/// Organization names are compared case-insensitively, as source-hosting services treat them.
#[derive(Debug, Clone, Default)]
pub struct ExclusionFilter {
    orgs: HashSet<String>,
}

impl ExclusionFilter {
    /// Build the filter; blank names are ignored.
    pub fn new<I, S>(orgs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let orgs = orgs
            .into_iter()
            .map(|o| o.as_ref().trim().to_ascii_lowercase())
            .filter(|o| !o.is_empty())
            .collect();
        Self { orgs }
    }

    #[inline]
    pub fn is_excluded(&self, org: &str) -> bool {
        !self.orgs.is_empty() && self.orgs.contains(&org.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.orgs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orgs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::ExclusionFilter;

    #[test]
    fn matches_case_insensitively() {
        let filter = ExclusionFilter::new(["Excluded-Org", "  other  "]);

        assert!(filter.is_excluded("excluded-org"));
        assert!(filter.is_excluded("EXCLUDED-ORG"));
        assert!(filter.is_excluded("other"));
        assert!(!filter.is_excluded("acme"));
    }

    #[test]
    fn blank_names_are_dropped() {
        let filter = ExclusionFilter::new(["", "   "]);
        assert!(filter.is_empty());
        assert!(!filter.is_excluded(""));
    }
}

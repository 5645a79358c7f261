//! Build configuration exclusion filter
//!
//! Patterns are matched against the whole configuration id, never a
//! substring, and evaluated in configuration order.

use regex::Regex;

use crate::{CistatError, Result};

/// Ordered list of compiled exclusion patterns
#[derive(Debug, Clone, Default)]
pub struct ExclusionFilter {
    patterns: Vec<Regex>,
}

impl ExclusionFilter {
    /// Compile the given patterns, preserving their order
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| compile_anchored(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Index of the first pattern that fully matches `config_id`
    pub fn first_match(&self, config_id: &str) -> Option<usize> {
        self.patterns.iter().position(|re| re.is_match(config_id))
    }

    pub fn is_excluded(&self, config_id: &str) -> bool {
        self.first_match(config_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

fn compile_anchored(pattern: &str) -> Result<Regex> {
    Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| CistatError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_match_semantics() {
        let filter = ExclusionFilter::new(["proj-.*"]).unwrap();
        assert!(filter.is_excluded("proj-nightly"));
        assert!(!filter.is_excluded("proj2"));
        assert!(!filter.is_excluded("my-proj-nightly"));
    }

    #[test]
    fn test_first_match_wins() {
        let filter = ExclusionFilter::new(["docs_.*", ".*_nightly", "docs_nightly"]).unwrap();
        assert_eq!(filter.first_match("docs_nightly"), Some(0));
        assert_eq!(filter.first_match("app_nightly"), Some(1));
        assert_eq!(filter.first_match("app_release"), None);
    }

    #[test]
    fn test_alternation_is_anchored_as_a_whole() {
        let filter = ExclusionFilter::new(["a|b"]).unwrap();
        assert!(filter.is_excluded("a"));
        assert!(!filter.is_excluded("ab"));
        assert!(!filter.is_excluded("xb"));
    }

    #[test]
    fn test_empty_filter_excludes_nothing() {
        let filter = ExclusionFilter::default();
        assert!(filter.is_empty());
        assert!(!filter.is_excluded("anything"));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = ExclusionFilter::new(["ok", "broken("]).unwrap_err();
        match err {
            CistatError::InvalidPattern { pattern, .. } => assert_eq!(pattern, "broken("),
            other => panic!("unexpected error: {other}"),
        }
    }
}

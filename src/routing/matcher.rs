//! Rule matching logic.
//!
//! # Responsibilities
//! - Classify a rule's path pattern (exact, prefix wildcard, suffix wildcard)
//! - Test a subpath against a pattern
//! - Select the first enabled rule that matches
//!
//! # Design Decisions
//! - Path matching is case-sensitive, no trailing-slash normalisation
//! - First match wins; precedence comes from rule order alone
//! - No regex to guarantee O(n) matching

use crate::model::Rule;

/// A rule's path pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathPattern<'a> {
    /// Must equal the subpath exactly.
    Exact(&'a str),
    /// `"<prefix>/*"`: the prefix itself or anything below it.
    Prefix(&'a str),
    /// `"*<suffix>"`: any subpath ending with the suffix.
    Suffix(&'a str),
}

impl<'a> PathPattern<'a> {
    pub fn parse(pattern: &'a str) -> Self {
        if let Some(prefix) = pattern.strip_suffix("/*") {
            PathPattern::Prefix(prefix)
        } else if let Some(suffix) = pattern.strip_prefix('*') {
            PathPattern::Suffix(suffix)
        } else {
            PathPattern::Exact(pattern)
        }
    }

    pub fn matches(&self, subpath: &str) -> bool {
        match *self {
            PathPattern::Exact(exact) => subpath == exact,
            PathPattern::Prefix(prefix) => {
                subpath == prefix
                    || subpath
                        .strip_prefix(prefix)
                        .is_some_and(|rest| rest.starts_with('/'))
            }
            PathPattern::Suffix(suffix) => subpath.ends_with(suffix),
        }
    }
}

/// Returns true if `pattern` matches `subpath`.
pub fn matches(pattern: &str, subpath: &str) -> bool {
    PathPattern::parse(pattern).matches(subpath)
}

/// First enabled rule, in slice order, whose pattern matches `subpath`.
pub fn find_rule<'r>(rules: &'r [Rule], subpath: &str) -> Option<&'r Rule> {
    rules
        .iter()
        .filter(|rule| rule.is_enabled)
        .find(|rule| matches(&rule.path_pattern, subpath))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::testing::rule;

    #[test]
    fn test_prefix_wildcard() {
        assert!(matches("/api/*", "/api"));
        assert!(matches("/api/*", "/api/"));
        assert!(matches("/api/*", "/api/x"));
        assert!(matches("/api/*", "/api/x/y"));
        assert!(!matches("/api/*", "/apix"));
        assert!(!matches("/api/*", "/v2/api/x"));
    }

    #[test]
    fn test_suffix_wildcard() {
        assert!(matches("*.json", "/a.json"));
        assert!(matches("*.json", "/weird.notjson.json"));
        assert!(!matches("*.json", "/a.xml"));
        assert!(!matches("*.json", "/a.json/"));
    }

    #[test]
    fn test_exact() {
        assert!(matches("/graphql", "/graphql"));
        assert!(!matches("/graphql", "/graphql/"));
        assert!(!matches("/graphql", "/graphql/x"));
        assert!(!matches("/graphql", "/GraphQL"));
    }

    #[test]
    fn test_pattern_classification() {
        assert_eq!(PathPattern::parse("/api/*"), PathPattern::Prefix("/api"));
        assert_eq!(PathPattern::parse("*.json"), PathPattern::Suffix(".json"));
        assert_eq!(PathPattern::parse("/env.json"), PathPattern::Exact("/env.json"));
        // Root wildcard covers every subpath.
        assert!(matches("/*", "/anything"));
        assert!(matches("*", "/anything"));
    }

    #[test]
    fn test_first_match_wins() {
        let rules = vec![
            rule("a", "rs", "/api/*", "https://a", 0),
            rule("b", "rs", "/api/users", "https://b", 1),
        ];
        assert_eq!(find_rule(&rules, "/api/users").unwrap().id, "a");
    }

    #[test]
    fn test_disabled_rules_skipped() {
        let mut disabled = rule("a", "rs", "/api/*", "https://a", 0);
        disabled.is_enabled = false;
        let rules = vec![disabled, rule("b", "rs", "*.json", "https://b", 1)];

        assert!(find_rule(&rules, "/api/users").is_none());
        assert_eq!(find_rule(&rules, "/api/users.json").unwrap().id, "b");
    }

    #[test]
    fn test_no_rules() {
        assert!(find_rule(&[], "/").is_none());
    }
}

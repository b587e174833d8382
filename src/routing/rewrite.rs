//! Internal path rewriting.
//!
//! Only applies to rules with `internal_rewrite` set, whose `target_url` is a
//! path on this server rather than a backend URL.

use crate::model::Rule;
use crate::routing::matcher::PathPattern;

/// Compute the rewritten subpath for `subpath` under `rule`.
pub fn rewrite(rule: &Rule, subpath: &str) -> String {
    rewrite_path(&rule.path_pattern, &rule.target_url, subpath)
}

/// Rewrite `subpath` matched by `pattern` onto `target`.
pub fn rewrite_path(pattern: &str, target: &str, subpath: &str) -> String {
    let base = target.strip_suffix('/').unwrap_or(target);

    match PathPattern::parse(pattern) {
        PathPattern::Exact(_) => target.to_string(),
        PathPattern::Prefix(prefix) => {
            let remainder = subpath
                .strip_prefix(prefix)
                .filter(|rest| rest.starts_with('/'));
            match remainder {
                Some(rest) => format!("{base}{rest}"),
                None => target.to_string(),
            }
        }
        PathPattern::Suffix(_) => {
            let file = subpath.rsplit('/').next().unwrap_or(subpath);
            format!("{base}/{file}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_rewrite() {
        assert_eq!(rewrite_path("/api/*", "/v2/api", "/api/users"), "/v2/api/users");
        assert_eq!(rewrite_path("/api/*", "/v2/api/", "/api/users/1"), "/v2/api/users/1");
        assert_eq!(rewrite_path("/api/*", "/v2/api", "/api/"), "/v2/api/");
    }

    #[test]
    fn test_prefix_equal_returns_target() {
        assert_eq!(rewrite_path("/api/*", "/v2/api", "/api"), "/v2/api");
    }

    #[test]
    fn test_suffix_rewrite() {
        assert_eq!(rewrite_path("*.json", "/data/", "/config.json"), "/data/config.json");
        assert_eq!(rewrite_path("*.json", "/data", "/nested/dir/config.json"), "/data/config.json");
    }

    #[test]
    fn test_exact_returns_target() {
        assert_eq!(
            rewrite_path("/env.json", "/environments/production.json", "/env.json"),
            "/environments/production.json"
        );
        assert_eq!(rewrite_path("/env.json", "/static/", "/anything"), "/static/");
    }

    #[test]
    fn test_unmatched_prefix_falls_back_to_target() {
        assert_eq!(rewrite_path("/api/*", "/v2/api", "/other"), "/v2/api");
    }
}

//! Domain types shared by the dispatch engine and its collaborators.
//!
//! Projects, aliases and rules are owned by the repository; the engine only
//! reads them. Forwarding options on a [`Rule`] are carried through untouched
//! for the forwarder.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Project identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub String);

/// Rule set identifier. The rule cache is keyed by this alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSetId(pub String);

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for RuleSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProjectId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for RuleSetId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A hosted project, addressed externally by `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub owner: String,
    pub name: String,
    #[serde(default)]
    pub default_proxy_rule_set_id: Option<RuleSetId>,
}

/// A named pointer at a deployed commit of a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alias {
    pub id: String,
    pub project_id: ProjectId,
    pub name: String,
    pub commit_sha: String,
    #[serde(default)]
    pub proxy_rule_set_id: Option<RuleSetId>,
    /// Created automatically for a preview deployment, as opposed to a
    /// user-named alias such as `production`.
    #[serde(default)]
    pub is_auto_preview: bool,
}

/// A single proxy or rewrite rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub rule_set_id: RuleSetId,
    /// Exact path, `"<prefix>/*"` or `"*<suffix>"`.
    pub path_pattern: String,
    /// A path when `internal_rewrite` is set, otherwise an absolute URL.
    pub target_url: String,
    /// Ascending; lower values are tried first.
    #[serde(default)]
    pub order: i32,
    #[serde(default = "default_enabled")]
    pub is_enabled: bool,
    #[serde(default)]
    pub internal_rewrite: bool,
    #[serde(default)]
    pub forward: ForwardOptions,
}

fn default_enabled() -> bool {
    true
}

/// Per-rule settings consumed only by the forwarder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwardOptions {
    /// Upstream timeout; falls back to the configured default when unset.
    pub timeout_ms: Option<u64>,
    /// Headers set on the upstream request, replacing any inbound value.
    pub headers: BTreeMap<String, String>,
    /// Inbound headers dropped before forwarding.
    pub remove_headers: Vec<String>,
    /// When false, `Cookie` is not sent upstream and `Set-Cookie` is not
    /// returned to the client.
    pub forward_cookies: bool,
    /// Replacement `Authorization` header value.
    pub authorization: Option<String>,
}

impl Default for ForwardOptions {
    fn default() -> Self {
        Self {
            timeout_ms: None,
            headers: BTreeMap::new(),
            remove_headers: Vec::new(),
            forward_cookies: true,
            authorization: None,
        }
    }
}

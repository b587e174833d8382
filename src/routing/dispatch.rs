//! Per-request dispatch decision.
//!
//! # States
//! ```text
//! NOT_APPLICABLE → PARSED → PROJECT_RESOLVED → RULES_LOADED → MATCHED → REWRITE | FORWARD
//!        └────────────┴─────────────┴──────────────┴────────────┴──→ PASS_THROUGH
//! ```
//!
//! # Design Decisions
//! - Fails open: any repository failure becomes a pass-through so static
//!   assets stay reachable when rule lookups break
//! - Decides only; applying the decision is the HTTP layer's job

use std::sync::Arc;

use crate::model::Rule;
use crate::observability::metrics;
use crate::repository::Repository;
use crate::routing::cache::RuleSetCache;
use crate::routing::matcher::find_rule;
use crate::routing::parser::{self, PublicPath};
use crate::routing::resolver::{ReferenceResolver, ResolveError};
use crate::routing::rewrite::rewrite;

/// What to do with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Hand the request to the next stage unchanged.
    PassThrough,
    /// Continue with `path` in place of the original request path.
    Rewrite { path: String, rule: Rule },
    /// Proxy the request to `rule.target_url`.
    Forward { rule: Rule, subpath: String },
}

impl Dispatch {
    pub fn outcome(&self) -> &'static str {
        match self {
            Dispatch::PassThrough => "pass_through",
            Dispatch::Rewrite { .. } => "rewrite",
            Dispatch::Forward { .. } => "forward",
        }
    }
}

/// Ties parsing, resolution, caching and matching together.
pub struct DispatchController {
    resolver: ReferenceResolver,
    cache: Arc<RuleSetCache>,
}

impl DispatchController {
    pub fn new(repository: Arc<dyn Repository>, cache: Arc<RuleSetCache>) -> Self {
        Self {
            resolver: ReferenceResolver::new(repository),
            cache,
        }
    }

    pub fn cache(&self) -> &Arc<RuleSetCache> {
        &self.cache
    }

    /// Decide how to handle a request for `path`.
    ///
    /// `original_uri` is the `X-Original-URI` header value, if any; when set,
    /// its path replaces the parsed subpath for matching.
    pub async fn dispatch(&self, path: &str, original_uri: Option<&str>) -> Dispatch {
        let dispatch = match self.try_dispatch(path, original_uri).await {
            Ok(dispatch) => dispatch,
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "Proxy rule resolution failed, passing through");
                metrics::record_dispatch("error");
                return Dispatch::PassThrough;
            }
        };
        metrics::record_dispatch(dispatch.outcome());
        dispatch
    }

    async fn try_dispatch(
        &self,
        path: &str,
        original_uri: Option<&str>,
    ) -> Result<Dispatch, ResolveError> {
        let Some(parsed) = parser::parse(path) else {
            return Ok(Dispatch::PassThrough);
        };

        let Some(resolution) = self.resolver.resolve(&parsed.target).await? else {
            tracing::trace!(path = %path, "No project for public path");
            return Ok(Dispatch::PassThrough);
        };
        let Some(rule_set_id) = resolution.rule_set_id.as_ref() else {
            return Ok(Dispatch::PassThrough);
        };

        let rules = self.cache.rules(Some(rule_set_id)).await?;
        let subpath = match original_uri {
            Some(uri) => parser::strip_query(uri),
            None => parsed.subpath.as_str(),
        };

        let Some(rule) = find_rule(&rules, subpath) else {
            return Ok(Dispatch::PassThrough);
        };

        tracing::debug!(
            path = %path,
            subpath = %subpath,
            rule_id = %rule.id,
            rule_set_id = %rule_set_id,
            source = resolution.source.as_str(),
            internal_rewrite = rule.internal_rewrite,
            "Proxy rule matched"
        );

        Ok(decide(&parsed, rule, subpath))
    }
}

fn decide(parsed: &PublicPath, rule: &Rule, subpath: &str) -> Dispatch {
    if rule.internal_rewrite {
        let rewritten = rewrite(rule, subpath);
        Dispatch::Rewrite {
            path: parsed.with_subpath(&rewritten),
            rule: rule.clone(),
        }
    } else {
        Dispatch::Forward {
            rule: rule.clone(),
            subpath: subpath.to_string(),
        }
    }
}

//! Effective rule set resolution.
//!
//! # Responsibilities
//! - Find the project a public path refers to
//! - Decide which single rule set applies, if any
//!
//! # Precedence
//! ```text
//! owner/repo/{sha}            → project default
//! owner/repo/{alias}          → alias rule set → project default
//! subdomain-alias/{alias}     → alias rule set
//!                             → commit sibling (auto-preview aliases only)
//!                             → project default
//! ```
//!
//! # Design Decisions
//! - Rule sets are used whole; never merged across levels
//! - Commit-sibling inheritance is a separate lookup, only on the subdomain path

use std::sync::Arc;
use thiserror::Error;

use crate::model::{Alias, Project, RuleSetId};
use crate::repository::{Repository, RepositoryError};
use crate::routing::parser::AssetRef;

/// Length of a full hex commit SHA.
const COMMIT_SHA_LEN: usize = 40;

/// Errors raised while resolving a reference.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("repository lookup failed: {0}")]
    Repository(#[from] RepositoryError),
}

/// Where the effective rule set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleSetSource {
    Alias,
    CommitSibling,
    ProjectDefault,
    None,
}

impl RuleSetSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleSetSource::Alias => "alias",
            RuleSetSource::CommitSibling => "commit_sibling",
            RuleSetSource::ProjectDefault => "project_default",
            RuleSetSource::None => "none",
        }
    }
}

/// Outcome of a successful project lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub project: Project,
    pub alias: Option<Alias>,
    pub rule_set_id: Option<RuleSetId>,
    pub source: RuleSetSource,
}

/// Returns true for a 40 character hex string, in any case.
pub fn is_commit_sha(reference: &str) -> bool {
    reference.len() == COMMIT_SHA_LEN && reference.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Resolves references against the repository.
#[derive(Clone)]
pub struct ReferenceResolver {
    repository: Arc<dyn Repository>,
}

impl ReferenceResolver {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    /// Resolve a parsed reference. `Ok(None)` means no project or alias was
    /// found and the request should pass through.
    pub async fn resolve(&self, target: &AssetRef) -> Result<Option<Resolution>, ResolveError> {
        match target {
            AssetRef::Project {
                owner,
                repo,
                reference,
                alias_qualified,
            } => {
                self.resolve_project_ref(owner, repo, reference, *alias_qualified)
                    .await
            }
            AssetRef::SubdomainAlias { alias } => self.resolve_global_alias(alias).await,
        }
    }

    async fn resolve_project_ref(
        &self,
        owner: &str,
        repo: &str,
        reference: &str,
        alias_qualified: bool,
    ) -> Result<Option<Resolution>, ResolveError> {
        let Some(project) = self.repository.project_by_owner_name(owner, repo).await? else {
            return Ok(None);
        };

        if !alias_qualified && is_commit_sha(reference) {
            return Ok(Some(project_default(project, None)));
        }

        let alias = self
            .repository
            .alias_by_project_and_name(&project.id, reference)
            .await?;

        match alias {
            Some(alias) if alias.proxy_rule_set_id.is_some() => {
                let rule_set_id = alias.proxy_rule_set_id.clone();
                Ok(Some(Resolution {
                    project,
                    alias: Some(alias),
                    rule_set_id,
                    source: RuleSetSource::Alias,
                }))
            }
            alias => Ok(Some(project_default(project, alias))),
        }
    }

    async fn resolve_global_alias(&self, name: &str) -> Result<Option<Resolution>, ResolveError> {
        let Some(alias) = self.repository.alias_by_name_global(name).await? else {
            return Ok(None);
        };
        let Some(project) = self.repository.project_by_id(&alias.project_id).await? else {
            tracing::debug!(alias = %name, project_id = %alias.project_id, "Alias has no project");
            return Ok(None);
        };

        if let Some(rule_set_id) = alias.proxy_rule_set_id.clone() {
            return Ok(Some(Resolution {
                project,
                alias: Some(alias),
                rule_set_id: Some(rule_set_id),
                source: RuleSetSource::Alias,
            }));
        }

        if let Some(rule_set_id) = self.inherit_from_commit_sibling(&alias).await? {
            return Ok(Some(Resolution {
                project,
                alias: Some(alias),
                rule_set_id: Some(rule_set_id),
                source: RuleSetSource::CommitSibling,
            }));
        }

        Ok(Some(project_default(project, Some(alias))))
    }

    /// Rule set of a manual alias deployed at the same commit as an
    /// auto-preview alias. Lets preview deployments pick up the production
    /// proxy configuration for that commit.
    async fn inherit_from_commit_sibling(
        &self,
        alias: &Alias,
    ) -> Result<Option<RuleSetId>, ResolveError> {
        if !alias.is_auto_preview || alias.proxy_rule_set_id.is_some() {
            return Ok(None);
        }
        let inherited = self
            .repository
            .rule_set_from_commit_sibling(&alias.project_id, &alias.commit_sha)
            .await?;
        if let Some(id) = &inherited {
            tracing::debug!(alias = %alias.name, rule_set_id = %id, "Inherited rule set from commit sibling");
        }
        Ok(inherited)
    }
}

fn project_default(project: Project, alias: Option<Alias>) -> Resolution {
    let rule_set_id = project.default_proxy_rule_set_id.clone();
    let source = if rule_set_id.is_some() {
        RuleSetSource::ProjectDefault
    } else {
        RuleSetSource::None
    };
    Resolution {
        project,
        alias,
        rule_set_id,
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::testing::{
        acme_snapshot, alias, project, BrokenRepository, SpyRepository, SHA,
    };
    use crate::repository::Snapshot;

    fn project_ref(reference: &str, alias_qualified: bool) -> AssetRef {
        AssetRef::Project {
            owner: "acme".into(),
            repo: "site".into(),
            reference: reference.into(),
            alias_qualified,
        }
    }

    fn subdomain(name: &str) -> AssetRef {
        AssetRef::SubdomainAlias { alias: name.into() }
    }

    fn rs(id: &str) -> Option<RuleSetId> {
        Some(RuleSetId::from(id))
    }

    #[test]
    fn test_commit_sha_classification() {
        assert!(is_commit_sha(SHA));
        assert!(is_commit_sha(&SHA.to_uppercase()));
        assert!(!is_commit_sha(&SHA[..39]));
        assert!(!is_commit_sha("production"));
        assert!(!is_commit_sha("zbcdef0123456789abcdef0123456789abcdef01"));
    }

    #[tokio::test]
    async fn test_commit_sha_skips_alias_lookup() {
        let spy = Arc::new(SpyRepository::new(acme_snapshot()));
        let resolver = ReferenceResolver::new(spy.clone());

        let resolution = resolver.resolve(&project_ref(SHA, false)).await.unwrap().unwrap();
        assert_eq!(resolution.rule_set_id, rs("rs1"));
        assert_eq!(resolution.source, RuleSetSource::ProjectDefault);
        assert_eq!(spy.alias_lookups(), 0);
    }

    #[tokio::test]
    async fn test_alias_overrides_project_default() {
        let resolver = ReferenceResolver::new(Arc::new(SpyRepository::new(acme_snapshot())));

        for qualified in [true, false] {
            let resolution = resolver
                .resolve(&project_ref("production", qualified))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(resolution.rule_set_id, rs("rs2"));
            assert_eq!(resolution.source, RuleSetSource::Alias);
        }
    }

    #[tokio::test]
    async fn test_alias_without_rule_set_uses_default() {
        let mut snapshot = acme_snapshot();
        snapshot.aliases.push(alias("p1", "staging", SHA, None, false));
        let resolver = ReferenceResolver::new(Arc::new(SpyRepository::new(snapshot)));

        let resolution = resolver.resolve(&project_ref("staging", true)).await.unwrap().unwrap();
        assert_eq!(resolution.rule_set_id, rs("rs1"));
        assert!(resolution.alias.is_some());

        let missing = resolver.resolve(&project_ref("nope", false)).await.unwrap().unwrap();
        assert_eq!(missing.rule_set_id, rs("rs1"));
        assert!(missing.alias.is_none());
    }

    #[tokio::test]
    async fn test_unknown_project() {
        let resolver = ReferenceResolver::new(Arc::new(SpyRepository::new(acme_snapshot())));
        let target = AssetRef::Project {
            owner: "acme".into(),
            repo: "missing".into(),
            reference: SHA.into(),
            alias_qualified: false,
        };
        assert!(resolver.resolve(&target).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_commit_sibling_is_not_used_on_project_paths() {
        let mut snapshot = acme_snapshot();
        snapshot.aliases.push(alias("p1", "preview-1", SHA, None, true));
        let spy = Arc::new(SpyRepository::new(snapshot));
        let resolver = ReferenceResolver::new(spy.clone());

        let resolution = resolver.resolve(&project_ref("preview-1", true)).await.unwrap().unwrap();
        assert_eq!(resolution.rule_set_id, rs("rs1"));
        assert_eq!(spy.sibling_lookups(), 0);
    }

    #[tokio::test]
    async fn test_subdomain_alias_own_rule_set() {
        let resolver = ReferenceResolver::new(Arc::new(SpyRepository::new(acme_snapshot())));
        let resolution = resolver.resolve(&subdomain("production")).await.unwrap().unwrap();
        assert_eq!(resolution.project.owner, "acme");
        assert_eq!(resolution.rule_set_id, rs("rs2"));
        assert_eq!(resolution.source, RuleSetSource::Alias);
    }

    #[tokio::test]
    async fn test_auto_preview_inherits_from_commit_sibling() {
        let mut snapshot = acme_snapshot();
        snapshot.aliases.push(alias("p1", "preview-abc", SHA, None, true));
        let resolver = ReferenceResolver::new(Arc::new(SpyRepository::new(snapshot)));

        let resolution = resolver.resolve(&subdomain("preview-abc")).await.unwrap().unwrap();
        assert_eq!(resolution.rule_set_id, rs("rs2"));
        assert_eq!(resolution.source, RuleSetSource::CommitSibling);
    }

    #[tokio::test]
    async fn test_auto_preview_without_sibling_uses_default() {
        let mut snapshot = acme_snapshot();
        let other_sha = "1111111111111111111111111111111111111111";
        snapshot.aliases.push(alias("p1", "preview-111", other_sha, None, true));
        let resolver = ReferenceResolver::new(Arc::new(SpyRepository::new(snapshot)));

        let resolution = resolver.resolve(&subdomain("preview-111")).await.unwrap().unwrap();
        assert_eq!(resolution.rule_set_id, rs("rs1"));
        assert_eq!(resolution.source, RuleSetSource::ProjectDefault);
    }

    #[tokio::test]
    async fn test_auto_preview_siblings_do_not_count() {
        let snapshot = Snapshot {
            projects: vec![project("p1", "acme", "site", None)],
            aliases: vec![
                alias("p1", "preview-a", SHA, Some("rs-preview"), true),
                alias("p1", "preview-b", SHA, None, true),
            ],
            rules: vec![],
        };
        let resolver = ReferenceResolver::new(Arc::new(SpyRepository::new(snapshot)));

        let resolution = resolver.resolve(&subdomain("preview-b")).await.unwrap().unwrap();
        assert_eq!(resolution.rule_set_id, None);
        assert_eq!(resolution.source, RuleSetSource::None);
    }

    #[tokio::test]
    async fn test_auto_preview_own_rule_set_skips_sibling_lookup() {
        let mut snapshot = acme_snapshot();
        snapshot
            .aliases
            .push(alias("p1", "preview-own", SHA, Some("rs-preview"), true));
        let spy = Arc::new(SpyRepository::new(snapshot));
        let resolver = ReferenceResolver::new(spy.clone());

        let resolution = resolver.resolve(&subdomain("preview-own")).await.unwrap().unwrap();
        assert_eq!(resolution.rule_set_id, rs("rs-preview"));
        assert_eq!(resolution.source, RuleSetSource::Alias);
        assert_eq!(spy.sibling_lookups(), 0);
    }

    #[tokio::test]
    async fn test_manual_alias_does_not_inherit() {
        let mut snapshot = acme_snapshot();
        snapshot.aliases.push(alias("p1", "staging", SHA, None, false));
        let spy = Arc::new(SpyRepository::new(snapshot));
        let resolver = ReferenceResolver::new(spy.clone());

        let resolution = resolver.resolve(&subdomain("staging")).await.unwrap().unwrap();
        assert_eq!(resolution.rule_set_id, rs("rs1"));
        assert_eq!(spy.sibling_lookups(), 0);
    }

    #[tokio::test]
    async fn test_unknown_global_alias() {
        let resolver = ReferenceResolver::new(Arc::new(SpyRepository::new(acme_snapshot())));
        assert!(resolver.resolve(&subdomain("ghost")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_repository_failure_is_an_error() {
        let resolver = ReferenceResolver::new(Arc::new(BrokenRepository));
        assert!(resolver.resolve(&project_ref(SHA, false)).await.is_err());
        assert!(resolver.resolve(&subdomain("production")).await.is_err());
    }
}

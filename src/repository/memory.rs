//! Snapshot-backed repository loaded from a TOML file.
//!
//! # Design Decisions
//! - Readers load the current snapshot with one atomic pointer read
//! - Reload swaps the whole snapshot; readers never observe a partial update
//! - Rules are sorted once at snapshot build, not per request

use arc_swap::ArcSwap;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::model::{Alias, Project, ProjectId, Rule, RuleSetId};
use crate::repository::{Repository, RepositoryError, RepositoryResult};

/// Complete repository contents.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Snapshot {
    pub projects: Vec<Project>,
    pub aliases: Vec<Alias>,
    pub rules: Vec<Rule>,
}

impl Snapshot {
    /// Parse a snapshot from TOML text and validate it.
    pub fn from_toml(content: &str) -> RepositoryResult<Self> {
        let snapshot: Snapshot = toml::from_str(content)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Read a snapshot from disk.
    pub fn load(path: &Path) -> RepositoryResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    fn validate(&self) -> RepositoryResult<()> {
        let mut project_ids = HashSet::new();
        let mut handles = HashSet::new();
        for project in &self.projects {
            if !project_ids.insert(&project.id) {
                return Err(RepositoryError::Invalid(format!(
                    "duplicate project id '{}'",
                    project.id
                )));
            }
            if !handles.insert((project.owner.as_str(), project.name.as_str())) {
                return Err(RepositoryError::Invalid(format!(
                    "duplicate project '{}/{}'",
                    project.owner, project.name
                )));
            }
        }

        let mut alias_names = HashSet::new();
        for alias in &self.aliases {
            if !project_ids.contains(&alias.project_id) {
                return Err(RepositoryError::Invalid(format!(
                    "alias '{}' references unknown project '{}'",
                    alias.name, alias.project_id
                )));
            }
            // Subdomain lookups resolve aliases by name alone.
            if !alias_names.insert(alias.name.as_str()) {
                return Err(RepositoryError::Invalid(format!(
                    "duplicate alias name '{}'",
                    alias.name
                )));
            }
        }
        Ok(())
    }

    fn sorted(mut self) -> Self {
        self.rules
            .sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
        self
    }
}

/// Repository serving lookups from an atomically swappable [`Snapshot`].
#[derive(Debug)]
pub struct InMemoryRepository {
    snapshot: ArcSwap<Snapshot>,
}

impl InMemoryRepository {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(snapshot.sorted()),
        }
    }

    /// Load the repository file at `path`.
    pub fn load_from_file(path: &Path) -> RepositoryResult<Self> {
        let repository = Self::new(Snapshot::load(path)?);
        let current = repository.snapshot.load();
        tracing::info!(
            path = ?path,
            projects = current.projects.len(),
            aliases = current.aliases.len(),
            rules = current.rules.len(),
            "Repository loaded"
        );
        Ok(repository)
    }

    /// Replace the whole snapshot.
    pub fn replace(&self, snapshot: Snapshot) {
        self.snapshot.store(Arc::new(snapshot.sorted()));
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.load_full()
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new(Snapshot::default())
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn project_by_owner_name(
        &self,
        owner: &str,
        name: &str,
    ) -> RepositoryResult<Option<Project>> {
        let snapshot = self.snapshot.load();
        Ok(snapshot
            .projects
            .iter()
            .find(|p| p.owner == owner && p.name == name)
            .cloned())
    }

    async fn project_by_id(&self, id: &ProjectId) -> RepositoryResult<Option<Project>> {
        let snapshot = self.snapshot.load();
        Ok(snapshot.projects.iter().find(|p| &p.id == id).cloned())
    }

    async fn alias_by_project_and_name(
        &self,
        project_id: &ProjectId,
        name: &str,
    ) -> RepositoryResult<Option<Alias>> {
        let snapshot = self.snapshot.load();
        Ok(snapshot
            .aliases
            .iter()
            .find(|a| &a.project_id == project_id && a.name == name)
            .cloned())
    }

    async fn alias_by_name_global(&self, name: &str) -> RepositoryResult<Option<Alias>> {
        let snapshot = self.snapshot.load();
        Ok(snapshot.aliases.iter().find(|a| a.name == name).cloned())
    }

    async fn rule_set_from_commit_sibling(
        &self,
        project_id: &ProjectId,
        commit_sha: &str,
    ) -> RepositoryResult<Option<RuleSetId>> {
        let snapshot = self.snapshot.load();
        Ok(snapshot
            .aliases
            .iter()
            .filter(|a| &a.project_id == project_id && !a.is_auto_preview)
            .filter(|a| a.commit_sha.eq_ignore_ascii_case(commit_sha))
            .find_map(|a| a.proxy_rule_set_id.clone()))
    }

    async fn effective_rules(&self, rule_set_id: &RuleSetId) -> RepositoryResult<Vec<Rule>> {
        let snapshot = self.snapshot.load();
        Ok(snapshot
            .rules
            .iter()
            .filter(|r| &r.rule_set_id == rule_set_id)
            .cloned()
            .collect())
    }
}

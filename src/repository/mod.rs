//! Persistence boundary for projects, aliases and rules.
//!
//! # Data Flow
//! ```text
//! routing::resolver  ──▶ Repository (project / alias lookups)
//! routing::cache     ──▶ Repository (rules of one rule set, on miss)
//!
//! repository file (TOML)
//!     → memory.rs (parse, validate, snapshot)
//!     → watcher.rs detects change → atomic snapshot swap
//! ```
//!
//! # Design Decisions
//! - The engine sees only the [`Repository`] trait; storage is replaceable
//! - Lookups return `Ok(None)` for absent entities; `Err` is reserved for
//!   backend failures, which the dispatcher treats as not-found

pub mod memory;
pub mod watcher;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{Alias, Project, ProjectId, Rule, RuleSetId};

pub use memory::{InMemoryRepository, Snapshot};
pub use watcher::RepositoryWatcher;

/// Errors surfaced by repository backends.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The backing store could not be reached or read.
    #[error("repository unavailable: {0}")]
    Unavailable(String),

    /// Repository file could not be read.
    #[error("failed to read repository file: {0}")]
    Io(#[from] std::io::Error),

    /// Repository file is not valid TOML for a snapshot.
    #[error("failed to parse repository file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Snapshot is structurally inconsistent.
    #[error("invalid repository data: {0}")]
    Invalid(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Read access to project, alias and rule data.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn project_by_owner_name(&self, owner: &str, name: &str)
        -> RepositoryResult<Option<Project>>;

    async fn project_by_id(&self, id: &ProjectId) -> RepositoryResult<Option<Project>>;

    async fn alias_by_project_and_name(
        &self,
        project_id: &ProjectId,
        name: &str,
    ) -> RepositoryResult<Option<Alias>>;

    /// Alias names are unique system-wide for this lookup.
    async fn alias_by_name_global(&self, name: &str) -> RepositoryResult<Option<Alias>>;

    /// Rule set of a manual (non auto-preview) alias in `project_id` that
    /// points at `commit_sha`, if one exists.
    async fn rule_set_from_commit_sibling(
        &self,
        project_id: &ProjectId,
        commit_sha: &str,
    ) -> RepositoryResult<Option<RuleSetId>>;

    /// Every rule of a rule set, ordered by ascending `order`.
    async fn effective_rules(&self, rule_set_id: &RuleSetId) -> RepositoryResult<Vec<Rule>>;
}

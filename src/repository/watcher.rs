//! Repository file watcher for hot reload.

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::repository::memory::{InMemoryRepository, Snapshot};

/// Reloads an [`InMemoryRepository`] whenever its backing file changes.
pub struct RepositoryWatcher {
    path: PathBuf,
    repository: Arc<InMemoryRepository>,
}

impl RepositoryWatcher {
    pub fn new(path: &Path, repository: Arc<InMemoryRepository>) -> Self {
        Self {
            path: path.to_path_buf(),
            repository,
        }
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let path = self.path.clone();
        let repository = self.repository.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        reload(&path, &repository);
                    }
                }
                Err(e) => tracing::error!(error = %e, "Repository watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Repository watcher started");
        Ok(watcher)
    }
}

/// Swap in the file's current contents; keep the old snapshot on failure.
pub(crate) fn reload(path: &Path, repository: &InMemoryRepository) -> bool {
    match Snapshot::load(path) {
        Ok(snapshot) => {
            tracing::info!(
                path = ?path,
                projects = snapshot.projects.len(),
                aliases = snapshot.aliases.len(),
                rules = snapshot.rules.len(),
                "Repository reloaded"
            );
            repository.replace(snapshot);
            true
        }
        Err(e) => {
            tracing::error!(path = ?path, error = %e, "Failed to reload repository, keeping current data");
            false
        }
    }
}

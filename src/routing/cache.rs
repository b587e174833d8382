//! Time-expiring rule set cache.
//!
//! # Responsibilities
//! - Map rule set id → enabled rules in precedence order
//! - Refetch from the repository once an entry's TTL has elapsed
//!
//! # Design Decisions
//! - Entries are trusted only while `now < expires_at`; rule edits are never
//!   pushed, so staleness is bounded by the TTL and nothing else
//! - No cross-key locking; each entry is replaced whole
//! - Concurrent misses on one key each fetch; the last insert wins
//! - Failed fetches are not cached

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::model::{Rule, RuleSetId};
use crate::observability::metrics;
use crate::repository::{Repository, RepositoryResult};

/// Default time-to-live for a cached rule set.
pub const DEFAULT_TTL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
struct CacheEntry {
    rules: Arc<[Rule]>,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Rule set cache shared by every request handler.
pub struct RuleSetCache {
    entries: DashMap<RuleSetId, CacheEntry>,
    repository: Arc<dyn Repository>,
    ttl: Duration,
}

impl RuleSetCache {
    pub fn new(repository: Arc<dyn Repository>, ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            repository,
            ttl,
        }
    }

    /// Enabled rules of `rule_set_id`, in precedence order.
    ///
    /// `None` yields an empty list without touching the repository.
    pub async fn rules(&self, rule_set_id: Option<&RuleSetId>) -> RepositoryResult<Arc<[Rule]>> {
        let Some(id) = rule_set_id else {
            return Ok(Arc::from(Vec::new()));
        };

        // Guard must be dropped before the fetch below.
        let cached = self
            .entries
            .get(id)
            .filter(|entry| entry.is_fresh(Instant::now()))
            .map(|entry| entry.rules.clone());
        if let Some(rules) = cached {
            metrics::record_rule_cache("hit");
            return Ok(rules);
        }

        metrics::record_rule_cache("miss");
        let fetched = self.repository.effective_rules(id).await?;
        let rules: Arc<[Rule]> = fetched.into_iter().filter(|r| r.is_enabled).collect();

        self.entries.insert(
            id.clone(),
            CacheEntry {
                rules: rules.clone(),
                expires_at: Instant::now() + self.ttl,
            },
        );
        metrics::record_rule_cache_size(self.entries.len());
        tracing::debug!(rule_set_id = %id, rules = rules.len(), "Rule set cached");

        Ok(rules)
    }

    /// Drop entries that are no longer trusted. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_fresh(now));
        let removed = before.saturating_sub(self.entries.len());
        metrics::record_rule_cache_size(self.entries.len());
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

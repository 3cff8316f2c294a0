//! Copy-on-write publication of the active pattern set.
//!
//! Readers load the current [`ActiveIndex`] without locking; writers rebuild
//! it from the store and swap the pointer. Writers are serialized so a slow
//! rebuild can never overwrite a snapshot read after it.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::db::Store;
use crate::errors::AppError;
use crate::models::pattern::{Pattern, PatternStatus};
use crate::services::regex_cache::RegexCache;
use crate::services::resolver::ActiveIndex;

pub struct PatternRegistry {
    store: Arc<dyn Store>,
    cache: Arc<RegexCache>,
    active: ArcSwap<ActiveIndex>,
    publish: Mutex<()>,
}

impl PatternRegistry {
    /// Empty registry; call [`refresh`](Self::refresh) before serving.
    pub fn new(store: Arc<dyn Store>, cache: Arc<RegexCache>) -> Self {
        Self {
            store,
            cache,
            active: ArcSwap::from_pointee(ActiveIndex::default()),
            publish: Mutex::new(()),
        }
    }

    /// Build a registry and publish the current active set.
    pub async fn load(store: Arc<dyn Store>, cache: Arc<RegexCache>) -> Result<Self, AppError> {
        let registry = Self::new(store, cache);
        registry.refresh().await?;
        Ok(registry)
    }

    pub fn cache(&self) -> &RegexCache {
        &self.cache
    }

    /// Current published snapshot.
    pub fn snapshot(&self) -> Arc<ActiveIndex> {
        self.active.load_full()
    }

    /// Ordered active candidates for a sender address.
    pub fn resolve(&self, sender: &str) -> Vec<Arc<Pattern>> {
        self.active.load().resolve(sender)
    }

    /// Reload active patterns and aliases from the store and publish them.
    pub async fn refresh(&self) -> Result<usize, AppError> {
        // Held across read and swap: the last snapshot stored is the last one read.
        let _guard = self.publish.lock().await;
        let patterns = self.store.list_by_status(PatternStatus::Active).await?;
        let aliases = self.store.list_aliases().await?;
        let index = ActiveIndex::build(patterns, &aliases);
        let count = index.len();
        self.active.store(Arc::new(index));
        tracing::debug!(active_patterns = count, "Published active pattern set");
        Ok(count)
    }

    /// Drop the compiled regex of `pattern_id` and republish.
    ///
    /// Invalidation happens before the new snapshot becomes visible.
    pub async fn publish_change(&self, pattern_id: uuid::Uuid) -> Result<(), AppError> {
        self.cache.invalidate(pattern_id);
        self.refresh().await?;
        Ok(())
    }

    /// Periodically republish so several instances converge on the same set.
    ///
    /// Returns `None` when `interval` is zero.
    pub fn spawn_refresher(self: &Arc<Self>, interval: Duration) -> Option<JoinHandle<()>> {
        if interval.is_zero() {
            return None;
        }
        let registry = Arc::clone(self);
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = registry.refresh().await {
                    tracing::warn!(error = %e, "Active set refresh failed; keeping previous snapshot");
                }
            }
        }))
    }
}

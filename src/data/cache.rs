//! In-memory caches
//!
//! Volatile and cleared on restart. Uses Moka for concurrent caching.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use crate::config::CacheConfig;
use crate::metrics::{CACHE_HITS_TOTAL, CACHE_MISSES_TOTAL, CACHE_SIZE};

const CACHE_NAME: &str = "author_name";

/// Author id -> display name
///
/// Post views need the author name for every post on a page. Profile edits
/// must call [`AuthorNameCache::invalidate`] so renames show up immediately.
#[derive(Clone)]
pub struct AuthorNameCache {
    names: Cache<u64, Arc<str>>,
}

impl AuthorNameCache {
    /// Create new author name cache
    ///
    /// # Arguments
    /// * `max_items` - Maximum number of names to keep
    /// * `ttl` - Time to live of each entry
    pub fn new(max_items: u64, ttl: Duration) -> Self {
        let names = Cache::builder()
            .max_capacity(max_items)
            .time_to_live(ttl)
            .build();

        Self { names }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(
            config.author_max_items,
            Duration::from_secs(config.author_ttl),
        )
    }

    pub async fn get(&self, author_id: u64) -> Option<Arc<str>> {
        let result = self.names.get(&author_id).await;

        if result.is_some() {
            CACHE_HITS_TOTAL.with_label_values(&[CACHE_NAME]).inc();
        } else {
            CACHE_MISSES_TOTAL.with_label_values(&[CACHE_NAME]).inc();
        }

        result
    }

    pub async fn insert(&self, author_id: u64, name: &str) -> Arc<str> {
        let name: Arc<str> = Arc::from(name);
        self.names.insert(author_id, name.clone()).await;

        CACHE_SIZE
            .with_label_values(&[CACHE_NAME])
            .set(self.names.entry_count() as i64);

        name
    }

    pub async fn invalidate(&self, author_id: u64) {
        self.names.invalidate(&author_id).await;
        tracing::debug!(author_id, "Author name evicted");
    }
}

/*!
 * Model metadata caching.
 *
 * Token limits and similar static model facts are looked up once per model
 * and shared by every client in the process. Failed lookups are remembered
 * too, so a provider that cannot describe a model is not asked again until
 * the entry expires.
 */

use log::debug;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crate::errors::ClientError;

/// Static capability information for a model.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModelInfo {
    /// Model identifier
    pub id: String,

    /// Maximum prompt size in tokens
    pub input_token_limit: Option<usize>,

    /// Maximum completion size in tokens
    pub output_token_limit: Option<usize>,

    /// Whether the model produces reasoning output
    pub supports_reasoning: bool,
}

impl ModelInfo {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_input_token_limit(mut self, limit: usize) -> Self {
        self.input_token_limit = Some(limit);
        self
    }

    pub fn with_output_token_limit(mut self, limit: usize) -> Self {
        self.output_token_limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    /// `None` records a failed lookup
    info: Option<ModelInfo>,
    inserted: Instant,
}

static SHARED_CACHE: Lazy<Arc<ModelInfoCache>> = Lazy::new(|| Arc::new(ModelInfoCache::new(None)));

/// Thread-safe cache of model metadata keyed by model id.
#[derive(Debug)]
pub struct ModelInfoCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Option<Duration>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl ModelInfoCache {
    /// Create a cache whose entries expire after `ttl` (never, if `None`).
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// The process-wide cache.
    pub fn shared() -> Arc<ModelInfoCache> {
        Arc::clone(&SHARED_CACHE)
    }

    /// Look up a model.
    ///
    /// Returns `None` on a miss and `Some(None)` for a remembered failure.
    pub fn get(&self, model: &str) -> Option<Option<ModelInfo>> {
        let entries = self.entries.read();
        match entries.get(model) {
            Some(entry) if !self.is_expired(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.info.clone())
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Record the result of a lookup.
    pub fn insert(&self, model: &str, info: Option<ModelInfo>) {
        let mut entries = self.entries.write();
        entries.insert(
            model.to_string(),
            CacheEntry {
                info,
                inserted: Instant::now(),
            },
        );
    }

    /// Return the cached entry for `model`, calling `fetch` on a miss.
    ///
    /// A failed fetch is cached as `None`. The lock is not held while
    /// fetching, so concurrent misses may fetch twice; the last write wins.
    pub async fn get_or_fetch<F, Fut>(&self, model: &str, fetch: F) -> Option<ModelInfo>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ModelInfo, ClientError>>,
    {
        if let Some(cached) = self.get(model) {
            return cached;
        }

        let info = match fetch().await {
            Ok(info) => Some(info),
            Err(error) => {
                debug!("Model info lookup for '{}' failed: {}", model, error);
                None
            }
        };

        self.insert(model, info.clone());
        info
    }

    /// Forget a single model.
    pub fn invalidate(&self, model: &str) {
        self.entries.write().remove(model);
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Hit and miss counts since creation.
    pub fn stats(&self) -> (usize, usize) {
        (self.hits.load(Ordering::Relaxed), self.misses.load(Ordering::Relaxed))
    }

    fn is_expired(&self, entry: &CacheEntry) -> bool {
        self.ttl.is_some_and(|ttl| entry.inserted.elapsed() >= ttl)
    }
}

impl Default for ModelInfoCache {
    fn default() -> Self {
        Self::new(None)
    }
}

/*!
 * Translation progress events.
 *
 * Subscribers are called synchronously, in subscription order, once for each
 * batch whose translation was applied. A subscriber that returns an error or
 * panics is logged and skipped; the others still run and the translation
 * carries on.
 */

use log::{debug, warn};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::document::{BatchContext, BatchKey, BatchStatus};

/// Published after a batch's translation has been applied.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchTranslated {
    pub scene: usize,
    pub batch: usize,

    /// Status the batch ended in
    pub status: BatchStatus,

    /// Summary returned for the batch
    pub summary: Option<String>,

    /// Scene summary after the batch
    pub scene_summary: Option<String>,

    /// Context stored on the batch
    pub context: BatchContext,

    /// Translated text keyed by line number
    pub translated: BTreeMap<usize, String>,
}

impl BatchTranslated {
    pub fn key(&self) -> BatchKey {
        BatchKey::new(self.scene, self.batch)
    }
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&BatchTranslated) -> anyhow::Result<()> + Send + Sync>;

/// Ordered list of `BatchTranslated` subscribers.
#[derive(Default)]
pub struct TranslationEvents {
    handlers: RwLock<Vec<(SubscriptionId, Handler)>>,
    next_id: AtomicU64,
}

impl TranslationEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler`; it runs after every handler registered before it.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&BatchTranslated) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers.write().push((id, Arc::new(handler)));
        debug!("Subscribed {:?} to batch events", id);
        id
    }

    /// Remove a subscriber. Returns false if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        handlers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// Deliver `event` to every subscriber, isolating failures.
    ///
    /// Returns the number of subscribers that failed.
    pub fn publish(&self, event: &BatchTranslated) -> usize {
        // Snapshot so handlers may subscribe or unsubscribe while running
        let handlers: Vec<(SubscriptionId, Handler)> = self.handlers.read().clone();
        let mut failures = 0;

        for (id, handler) in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    failures += 1;
                    warn!("Subscriber {:?} failed handling {}: {}", id, event.key(), error);
                }
                Err(_) => {
                    failures += 1;
                    warn!("Subscriber {:?} panicked handling {}", id, event.key());
                }
            }
        }

        failures
    }
}

impl std::fmt::Debug for TranslationEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslationEvents")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

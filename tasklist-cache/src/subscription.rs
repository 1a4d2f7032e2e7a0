//! Subscriptions to cache keys and the periodic refresh loop behind them.

use std::fmt;
use std::sync::Weak;
use std::time::Duration;

use tasklist_core::{ErrorKind, QueryKey, SyncError, SyncResult};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::fetcher::CacheableValue;
use crate::freshness::CacheRead;
use crate::query_cache::{Inner, QueryCache};

/// A change to one cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEvent {
    pub key: QueryKey,
    pub kind: CacheEventKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEventKind {
    /// A fetch stored a new value.
    Updated,
    /// The key was marked stale.
    Invalidated,
    /// A fetch failed; the previous value is still cached.
    FetchFailed(ErrorKind),
    /// The subscriber fell behind and missed this many events.
    Lagged(u64),
}

/// Live interest in one cache key.
///
/// While at least one subscription with a refresh interval is alive, the key
/// is periodically re-read. Dropping the last subscription cancels the timer.
pub struct Subscription {
    key: QueryKey,
    inner: Weak<Inner>,
    events: broadcast::Receiver<CacheEvent>,
}

impl Subscription {
    pub(crate) fn new(
        key: QueryKey,
        inner: Weak<Inner>,
        events: broadcast::Receiver<CacheEvent>,
    ) -> Self {
        Self { key, inner, events }
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Read the subscribed key through the cache.
    pub async fn read<T: CacheableValue>(&self) -> SyncResult<CacheRead<T>> {
        self.cache()?.read(&self.key).await
    }

    /// Cached value of the subscribed key, without fetching.
    pub fn peek<T: CacheableValue>(&self) -> SyncResult<Option<T>> {
        self.cache()?.peek(&self.key)
    }

    /// Wait for the next event on the subscribed key.
    ///
    /// Returns `None` once the cache has been dropped.
    pub async fn changed(&mut self) -> Option<CacheEvent> {
        loop {
            match self.events.recv().await {
                Ok(event) if event.key == self.key => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(key = %self.key, skipped, "subscriber lagged, some events were dropped");
                    return Some(self.lagged(skipped));
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next pending event on the subscribed key, if any, without waiting.
    pub fn try_changed(&mut self) -> Option<CacheEvent> {
        loop {
            match self.events.try_recv() {
                Ok(event) if event.key == self.key => return Some(event),
                Ok(_) => continue,
                Err(TryRecvError::Lagged(skipped)) => return Some(self.lagged(skipped)),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    fn lagged(&self, skipped: u64) -> CacheEvent {
        CacheEvent {
            key: self.key.clone(),
            kind: CacheEventKind::Lagged(skipped),
        }
    }

    fn cache(&self) -> SyncResult<QueryCache> {
        self.inner
            .upgrade()
            .map(QueryCache::from_inner)
            .ok_or_else(|| SyncError::configuration("query cache has been dropped"))
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.release(&self.key);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("cache_alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

/// Invalidate and re-read `key` every `interval` until aborted or the cache
/// is dropped.
pub(crate) fn spawn_refresh(inner: Weak<Inner>, key: QueryKey, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let Some(inner) = inner.upgrade() else {
                break;
            };
            let cache = QueryCache::from_inner(inner);
            cache.invalidate(&key);
            match cache.read_value(&key).await {
                Ok(_) => debug!(key = %key, "periodic refresh completed"),
                Err(err) => warn!(key = %key, error = %err, "periodic refresh failed"),
            }
        }
    })
}

//! Keyed query cache with fetch coalescing.
//!
//! Entry state lives behind one mutex that is only held for bookkeeping and
//! never across an `.await`. Fetches run as spawned tasks: a reader that goes
//! away does not cancel the fetch, and the result still lands in the cache.
//!
//! Each entry carries a generation counter. Invalidation bumps it, and a fetch
//! only marks the entry fresh if the generation it started under is still
//! current. This keeps read-after-write consistency when a mutation completes
//! while a list fetch is already on the wire.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use tasklist_core::{QueryKey, SyncError, SyncResult, Timestamp};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::fetcher::{CacheableValue, ErasedFetcher, QueryFetcher};
use crate::freshness::{CacheRead, EntryState, Freshness, ReadSource};
use crate::stats::{CacheStats, StatCounters};
use crate::subscription::{spawn_refresh, CacheEvent, CacheEventKind, Subscription};

/// Configuration for the query cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Whether the cache runs in an interactive (browser-like) context.
    /// Periodic refresh timers are only started when this is true.
    pub browser_context: bool,
    /// Change events buffered per subscriber before it starts lagging.
    pub event_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            browser_context: true,
            event_capacity: 64,
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_browser_context(mut self, browser_context: bool) -> Self {
        self.browser_context = browser_context;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }
}

/// Per-subscription options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Invalidate and re-read the key at this cadence while subscribed.
    pub refresh_interval: Option<Duration>,
}

impl ReadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refresh_every(interval: Duration) -> Self {
        Self {
            refresh_interval: Some(interval),
        }
    }
}

#[derive(Debug, Clone)]
struct Fetched {
    value: Value,
    fetched_at: Timestamp,
}

type SharedFetch = Shared<BoxFuture<'static, SyncResult<Fetched>>>;

struct InFlight {
    id: u64,
    generation: u64,
    fetch: SharedFetch,
}

pub(crate) struct RefreshTask {
    pub interval: Duration,
    pub handle: JoinHandle<()>,
}

pub(crate) struct Entry {
    fetcher: Arc<dyn ErasedFetcher>,
    value: Option<Value>,
    fresh: bool,
    last_fetched_at: Option<Timestamp>,
    generation: u64,
    in_flight: Option<InFlight>,
    pub(crate) subscribers: usize,
    pub(crate) refresh: Option<RefreshTask>,
}

impl Entry {
    fn new(fetcher: Arc<dyn ErasedFetcher>) -> Self {
        Self {
            fetcher,
            value: None,
            fresh: false,
            last_fetched_at: None,
            generation: 0,
            in_flight: None,
            subscribers: 0,
            refresh: None,
        }
    }

    fn freshness(&self) -> Freshness {
        if self.in_flight.is_some() {
            Freshness::InFlight
        } else if self.fresh {
            Freshness::Fresh
        } else {
            Freshness::Stale
        }
    }

    fn state(&self) -> EntryState {
        EntryState {
            freshness: self.freshness(),
            has_value: self.value.is_some(),
            last_fetched_at: self.last_fetched_at,
            subscribers: self.subscribers,
            refreshing: self.refresh.is_some(),
        }
    }

    /// Returns true if the entry's state changed.
    ///
    /// A stale entry with no current fetch is left alone, so repeated
    /// invalidations collapse into one.
    fn mark_stale(&mut self) -> bool {
        let current_fetch = self
            .in_flight
            .as_ref()
            .is_some_and(|f| f.generation == self.generation);
        let changed = self.fresh || current_fetch;
        if changed {
            self.generation += 1;
        }
        self.fresh = false;
        changed
    }
}

pub(crate) struct Inner {
    config: CacheConfig,
    entries: Mutex<HashMap<QueryKey, Entry>>,
    events: broadcast::Sender<CacheEvent>,
    stats: StatCounters,
    next_fetch_id: AtomicU64,
    shut_down: AtomicBool,
}

impl Inner {
    pub(crate) fn entries(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, key: &QueryKey, kind: CacheEventKind) {
        match self.events.send(CacheEvent {
            key: key.clone(),
            kind,
        }) {
            Ok(receivers) => debug!(key = %key, ?kind, receivers, "cache event"),
            // No subscribers - this is fine
            Err(_) => debug!(key = %key, ?kind, "no receivers for cache event"),
        }
    }

    fn complete(&self, key: &QueryKey, fetch_id: u64, outcome: &SyncResult<Fetched>) {
        let kind = {
            let mut entries = self.entries();
            let Some(entry) = entries.get_mut(key) else {
                return;
            };
            let started_under = match &entry.in_flight {
                Some(in_flight) if in_flight.id == fetch_id => in_flight.generation,
                _ => return,
            };
            entry.in_flight = None;
            match outcome {
                Ok(fetched) => {
                    entry.value = Some(fetched.value.clone());
                    entry.last_fetched_at = Some(fetched.fetched_at);
                    entry.fresh = entry.generation == started_under;
                    info!(key = %key, fresh = entry.fresh, "fetch completed");
                    CacheEventKind::Updated
                }
                Err(err) => {
                    StatCounters::bump(&self.stats.failures);
                    warn!(key = %key, error = %err, "fetch failed, keeping previous value");
                    CacheEventKind::FetchFailed(err.kind())
                }
            }
        };
        self.emit(key, kind);
    }

    pub(crate) fn release(&self, key: &QueryKey) {
        let mut entries = self.entries();
        let Some(entry) = entries.get_mut(key) else {
            return;
        };
        entry.subscribers = entry.subscribers.saturating_sub(1);
        if entry.subscribers == 0 {
            if let Some(task) = entry.refresh.take() {
                task.handle.abort();
                debug!(key = %key, "last subscriber left, periodic refresh cancelled");
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let entries = self.entries.get_mut().unwrap_or_else(PoisonError::into_inner);
        for entry in entries.values_mut() {
            if let Some(task) = entry.refresh.take() {
                task.handle.abort();
            }
        }
    }
}

/// Keyed store of query results and their freshness.
///
/// Cloning is cheap and every clone shares the same entries. Create one at
/// start-up, hand clones to whoever reads or writes, and call
/// [`QueryCache::shutdown`] when the application exits.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<Inner>,
}

impl QueryCache {
    pub fn new(config: CacheConfig) -> Self {
        let (events, _rx) = broadcast::channel(config.event_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                config,
                entries: Mutex::new(HashMap::new()),
                events,
                stats: StatCounters::default(),
                next_fetch_id: AtomicU64::new(0),
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    /// Create a new cache with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    pub(crate) fn from_inner(inner: Arc<Inner>) -> Self {
        Self { inner }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Register the fetcher that populates `key`.
    ///
    /// Replacing the fetcher of an existing key marks it stale.
    pub fn register<F: QueryFetcher>(&self, key: QueryKey, fetcher: F) {
        let fetcher: Arc<dyn ErasedFetcher> = Arc::new(fetcher);
        let mut entries = self.inner.entries();
        match entries.get_mut(&key) {
            Some(entry) => {
                entry.fetcher = fetcher;
                entry.mark_stale();
                debug!(key = %key, "replaced fetcher");
            }
            None => {
                debug!(key = %key, "registered fetcher");
                entries.insert(key, Entry::new(fetcher));
            }
        }
    }

    pub fn is_registered(&self, key: &QueryKey) -> bool {
        self.inner.entries().contains_key(key)
    }

    /// Read `key`, fetching if the entry is not fresh.
    ///
    /// Concurrent reads of a stale key share one fetch. Errors are returned
    /// to every reader of the failed fetch; the previous value stays cached.
    pub async fn read<T: CacheableValue>(&self, key: &QueryKey) -> SyncResult<CacheRead<T>> {
        let (value, fetched_at, source) = self.read_value(key).await?.into_parts();
        Ok(CacheRead::new(decode(key, value)?, fetched_at, source))
    }

    /// Register `fetcher` for `key` if none is registered yet, then read.
    pub async fn read_with<F: QueryFetcher>(
        &self,
        key: QueryKey,
        fetcher: F,
    ) -> SyncResult<CacheRead<F::Output>> {
        self.inner
            .entries()
            .entry(key.clone())
            .or_insert_with(|| Entry::new(Arc::new(fetcher)));
        self.read(&key).await
    }

    pub(crate) async fn read_value(&self, key: &QueryKey) -> SyncResult<CacheRead<Value>> {
        let mut reader_generation = None;
        loop {
            let (fetch, fetch_generation, wanted, source) = {
                let mut entries = self.inner.entries();
                let entry = entries.get_mut(key).ok_or_else(|| unregistered(key))?;
                let wanted = *reader_generation.get_or_insert(entry.generation);

                if entry.fresh {
                    if let (Some(value), Some(fetched_at)) = (&entry.value, entry.last_fetched_at) {
                        StatCounters::bump(&self.inner.stats.hits);
                        debug!(key = %key, "cache hit");
                        return Ok(CacheRead::new(value.clone(), fetched_at, ReadSource::Cache));
                    }
                }

                let joined = entry
                    .in_flight
                    .as_ref()
                    .map(|f| (f.fetch.clone(), f.generation));
                match joined {
                    Some((fetch, generation)) => {
                        StatCounters::bump(&self.inner.stats.joins);
                        debug!(key = %key, "joining in-flight fetch");
                        (fetch, generation, wanted, ReadSource::Joined)
                    }
                    None => {
                        StatCounters::bump(&self.inner.stats.fetches);
                        let fetch = self.start_fetch(key, entry);
                        (fetch, entry.generation, wanted, ReadSource::Fetch)
                    }
                }
            };

            let outcome = fetch.await;
            if fetch_generation >= wanted {
                return outcome.map(|f| CacheRead::new(f.value, f.fetched_at, source));
            }
            // The fetch started before this read's view of the key was
            // invalidated; its data may predate the write.
            debug!(key = %key, "in-flight fetch predates invalidation, fetching again");
        }
    }

    fn start_fetch(&self, key: &QueryKey, entry: &mut Entry) -> SharedFetch {
        let id = self.inner.next_fetch_id.fetch_add(1, Ordering::Relaxed);
        let generation = entry.generation;
        let fetcher = Arc::clone(&entry.fetcher);
        let weak = Arc::downgrade(&self.inner);
        let task_key = key.clone();
        info!(key = %key, generation, "fetch started");

        let task = tokio::spawn(async move {
            let outcome = fetcher.fetch_value().await.map(|value| Fetched {
                value,
                fetched_at: Utc::now(),
            });
            if let Some(inner) = weak.upgrade() {
                inner.complete(&task_key, id, &outcome);
            }
            outcome
        });

        let weak = Arc::downgrade(&self.inner);
        let abandon_key = key.clone();
        let fetch = async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(join_err) => {
                    let err = SyncError::network(format!("fetch task did not complete: {join_err}"));
                    let outcome = Err(err);
                    if let Some(inner) = weak.upgrade() {
                        inner.complete(&abandon_key, id, &outcome);
                    }
                    outcome
                }
            }
        }
        .boxed()
        .shared();

        entry.in_flight = Some(InFlight {
            id,
            generation,
            fetch: fetch.clone(),
        });
        fetch
    }

    /// Mark `key` stale so the next read fetches.
    ///
    /// Never fetches by itself. Returns false when nothing changed: the key is
    /// unknown, or already stale with no current fetch.
    pub fn invalidate(&self, key: &QueryKey) -> bool {
        let changed = match self.inner.entries().get_mut(key) {
            Some(entry) => entry.mark_stale(),
            None => {
                debug!(key = %key, "invalidate of unregistered key ignored");
                false
            }
        };
        if changed {
            StatCounters::bump(&self.inner.stats.invalidations);
            debug!(key = %key, "invalidated");
            self.inner.emit(key, CacheEventKind::Invalidated);
        }
        changed
    }

    /// Decode the cached value of `key` without fetching.
    pub fn peek<T: CacheableValue>(&self, key: &QueryKey) -> SyncResult<Option<T>> {
        let value = {
            let entries = self.inner.entries();
            let entry = entries.get(key).ok_or_else(|| unregistered(key))?;
            entry.value.clone()
        };
        value.map(|v| decode(key, v)).transpose()
    }

    /// Bookkeeping snapshot of `key`, or `None` if it is not registered.
    pub fn state(&self, key: &QueryKey) -> Option<EntryState> {
        self.inner.entries().get(key).map(Entry::state)
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.stats.snapshot()
    }

    /// Follow changes to `key`.
    ///
    /// With a refresh interval, the key is invalidated and re-read at that
    /// cadence for as long as at least one subscription to it is alive. When
    /// several subscribers ask for different intervals the shortest wins.
    pub fn subscribe(&self, key: &QueryKey, options: ReadOptions) -> SyncResult<Subscription> {
        if options.refresh_interval.is_some_and(|i| i.is_zero()) {
            return Err(SyncError::configuration(format!(
                "refresh interval for `{key}` must be greater than zero"
            )));
        }

        let events = self.inner.events.subscribe();
        {
            let mut entries = self.inner.entries();
            let entry = entries.get_mut(key).ok_or_else(|| unregistered(key))?;
            entry.subscribers += 1;
            if let Some(interval) = options.refresh_interval {
                self.ensure_refresh(key, entry, interval);
            }
        }
        Ok(Subscription::new(
            key.clone(),
            Arc::downgrade(&self.inner),
            events,
        ))
    }

    /// Register `fetcher` for `key` if none is registered yet, then subscribe.
    pub fn subscribe_with<F: QueryFetcher>(
        &self,
        key: QueryKey,
        fetcher: F,
        options: ReadOptions,
    ) -> SyncResult<Subscription> {
        self.inner
            .entries()
            .entry(key.clone())
            .or_insert_with(|| Entry::new(Arc::new(fetcher)));
        self.subscribe(&key, options)
    }

    fn ensure_refresh(&self, key: &QueryKey, entry: &mut Entry, interval: Duration) {
        if !self.inner.config.browser_context {
            debug!(key = %key, "periodic refresh disabled outside a browser context");
            return;
        }
        if self.is_shut_down() {
            return;
        }
        if let Some(task) = &entry.refresh {
            if task.interval <= interval {
                return;
            }
            task.handle.abort();
        }
        info!(key = %key, interval_ms = interval.as_millis() as u64, "periodic refresh started");
        let handle = spawn_refresh(Arc::downgrade(&self.inner), key.clone(), interval);
        entry.refresh = Some(RefreshTask { interval, handle });
    }

    /// Cancel every periodic refresh. Reads keep working; no new refresh
    /// timers are started afterwards.
    pub fn shutdown(&self) {
        self.inner.shut_down.store(true, Ordering::Release);
        let mut cancelled = 0usize;
        for entry in self.inner.entries().values_mut() {
            if let Some(task) = entry.refresh.take() {
                task.handle.abort();
                cancelled += 1;
            }
        }
        info!(cancelled, "query cache shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::Acquire)
    }
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache")
            .field("config", &self.inner.config)
            .field("keys", &self.inner.entries().len())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

fn unregistered(key: &QueryKey) -> SyncError {
    SyncError::configuration(format!("no fetcher registered for query key `{key}`"))
}

fn decode<T: CacheableValue>(key: &QueryKey, value: Value) -> SyncResult<T> {
    serde_json::from_value(value).map_err(|e| {
        SyncError::configuration(format!("cached value for `{key}` has an unexpected shape: {e}"))
    })
}

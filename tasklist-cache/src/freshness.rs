//! Freshness states and read results.
//!
//! Every read returns a [`CacheRead<T>`] so callers can tell whether the value
//! came from memory or from a fetch, and when it was fetched.

use std::time::Duration;

use chrono::Utc;
use tasklist_core::Timestamp;

/// Freshness of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Freshness {
    /// The value may be served without a network call.
    Fresh,
    /// The next read must fetch. The previous value, if any, is still held.
    Stale,
    /// A fetch is currently populating the entry.
    InFlight,
}

impl Freshness {
    pub fn is_fresh(self) -> bool {
        matches!(self, Self::Fresh)
    }

    pub fn is_stale(self) -> bool {
        matches!(self, Self::Stale)
    }

    pub fn is_in_flight(self) -> bool {
        matches!(self, Self::InFlight)
    }
}

/// Snapshot of an entry's bookkeeping, without its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryState {
    pub freshness: Freshness,
    pub has_value: bool,
    pub last_fetched_at: Option<Timestamp>,
    pub subscribers: usize,
    /// Whether a periodic refresh timer is running for the entry.
    pub refreshing: bool,
}

/// Where a read's value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadSource {
    /// Served from a fresh entry.
    Cache,
    /// This read started the fetch.
    Fetch,
    /// This read joined a fetch another reader had already started.
    Joined,
}

/// Result of a cache read, carrying freshness metadata.
#[derive(Debug, Clone)]
pub struct CacheRead<T> {
    value: T,
    fetched_at: Timestamp,
    source: ReadSource,
}

impl<T> CacheRead<T> {
    pub(crate) fn new(value: T, fetched_at: Timestamp, source: ReadSource) -> Self {
        Self {
            value,
            fetched_at,
            source,
        }
    }

    pub(crate) fn into_parts(self) -> (T, Timestamp, ReadSource) {
        (self.value, self.fetched_at, self.source)
    }

    /// Consume the wrapper and return the underlying value.
    pub fn into_value(self) -> T {
        self.value
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    /// When the value was fetched from the remote store.
    pub fn fetched_at(&self) -> Timestamp {
        self.fetched_at
    }

    pub fn source(&self) -> ReadSource {
        self.source
    }

    pub fn was_cache_hit(&self) -> bool {
        self.source == ReadSource::Cache
    }

    /// How long ago the value was fetched.
    pub fn age(&self) -> Duration {
        Utc::now()
            .signed_duration_since(self.fetched_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Map the inner value to a new type.
    pub fn map<U, F>(self, f: F) -> CacheRead<U>
    where
        F: FnOnce(T) -> U,
    {
        CacheRead {
            value: f(self.value),
            fetched_at: self.fetched_at,
            source: self.source,
        }
    }
}

impl<T> AsRef<T> for CacheRead<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_freshness_predicates() {
        assert!(Freshness::Fresh.is_fresh());
        assert!(Freshness::Stale.is_stale());
        assert!(Freshness::InFlight.is_in_flight());
        assert!(!Freshness::InFlight.is_fresh());
    }

    #[test]
    fn test_cache_read_age() {
        let past = Utc::now() - chrono::Duration::seconds(5);
        let read = CacheRead::new("todos", past, ReadSource::Cache);

        let age = read.age();
        assert!(age >= Duration::from_secs(4));
        assert!(age <= Duration::from_secs(10));
        assert!(read.was_cache_hit());
    }

    #[test]
    fn test_cache_read_future_timestamp_has_zero_age() {
        let future = Utc::now() + chrono::Duration::seconds(30);
        let read = CacheRead::new(1u8, future, ReadSource::Fetch);
        assert_eq!(read.age(), Duration::ZERO);
        assert!(!read.was_cache_hit());
    }

    #[test]
    fn test_cache_read_map() {
        let read = CacheRead::new(vec![1, 2, 3], Utc::now(), ReadSource::Joined);
        let mapped = read.map(|v| v.len());
        assert_eq!(mapped.source(), ReadSource::Joined);
        assert_eq!(mapped.into_value(), 3);
    }
}

//! Fetchers populate cache entries from the remote store.

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tasklist_core::{SyncError, SyncResult};

/// Marker trait for values the cache can hold.
///
/// Entries are stored as JSON values so one cache can hold results of
/// different types; reads decode back into the caller's type.
pub trait CacheableValue: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> CacheableValue for T where T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

/// Produces the value for one cache key.
#[async_trait]
pub trait QueryFetcher: Send + Sync + 'static {
    type Output: CacheableValue;

    async fn fetch(&self) -> SyncResult<Self::Output>;
}

/// Type-erased fetcher stored in cache entries.
#[async_trait]
pub(crate) trait ErasedFetcher: Send + Sync {
    async fn fetch_value(&self) -> SyncResult<Value>;
}

#[async_trait]
impl<F> ErasedFetcher for F
where
    F: QueryFetcher,
{
    async fn fetch_value(&self) -> SyncResult<Value> {
        let output = self.fetch().await?;
        serde_json::to_value(output).map_err(|e| {
            SyncError::configuration(format!("fetched value cannot be cached: {e}"))
        })
    }
}

/// Fetcher backed by an async closure.
pub struct FnFetcher<F, Fut, T> {
    f: F,
    _marker: PhantomData<fn() -> (Fut, T)>,
}

/// Build a fetcher from a closure returning a future.
pub fn fetcher_fn<F, Fut, T>(f: F) -> FnFetcher<F, Fut, T>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = SyncResult<T>> + Send + 'static,
    T: CacheableValue,
{
    FnFetcher {
        f,
        _marker: PhantomData,
    }
}

#[async_trait]
impl<F, Fut, T> QueryFetcher for FnFetcher<F, Fut, T>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = SyncResult<T>> + Send + 'static,
    T: CacheableValue,
{
    type Output = T;

    async fn fetch(&self) -> SyncResult<T> {
        (self.f)().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fn_fetcher_erases_to_json() {
        let fetcher = fetcher_fn(|| async { Ok::<_, SyncError>(vec![3u32, 1, 2]) });
        let value = fetcher.fetch_value().await.unwrap();
        assert_eq!(value, serde_json::json!([3, 1, 2]));
    }

    #[tokio::test]
    async fn test_fn_fetcher_propagates_errors() {
        let fetcher = fetcher_fn(|| async { Err::<u8, _>(SyncError::network("down")) });
        let err = fetcher.fetch_value().await.unwrap_err();
        assert_eq!(err, SyncError::network("down"));
    }
}

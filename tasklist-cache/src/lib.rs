//! Synchronization cache for remote query results.
//!
//! The cache holds one entry per [`QueryKey`]. Each entry tracks its value,
//! whether that value may be served without a network call, and the single
//! fetch that may currently be populating it.
//!
//! # Design
//!
//! - Reads of a fresh entry never touch the network.
//! - Reads of a stale or empty entry start one fetch; every concurrent reader
//!   of the same key awaits that fetch instead of issuing its own.
//! - Writers never update entries directly. They call
//!   [`QueryCache::invalidate`] and the next read fetches server state.
//! - A failed fetch keeps the previous value and leaves the entry stale.
//!
//! # Example
//!
//! ```ignore
//! let cache = QueryCache::new(CacheConfig::default());
//! cache.register(QueryKey::TODOS, fetcher_fn(move || {
//!     let api = api.clone();
//!     async move { api.list_todos().await }
//! }));
//!
//! let todos = cache.read::<Vec<Todo>>(&QueryKey::TODOS).await?.into_value();
//! cache.invalidate(&QueryKey::TODOS);
//! ```
//!
//! [`QueryKey`]: tasklist_core::QueryKey

pub mod fetcher;
pub mod freshness;
pub mod query_cache;
pub mod stats;
pub mod subscription;

pub use fetcher::{fetcher_fn, CacheableValue, FnFetcher, QueryFetcher};
pub use freshness::{CacheRead, EntryState, Freshness, ReadSource};
pub use query_cache::{CacheConfig, QueryCache, ReadOptions};
pub use stats::CacheStats;
pub use subscription::{CacheEvent, CacheEventKind, Subscription};

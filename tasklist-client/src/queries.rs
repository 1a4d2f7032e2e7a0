//! Query registrations: which remote operation populates which cache key.

use async_trait::async_trait;
use std::sync::Arc;
use tasklist_cache::{CacheRead, QueryCache, QueryFetcher};
use tasklist_core::{HealthStatus, QueryKey, SyncResult, Todo, TodoApi};

/// Populates [`QueryKey::TODOS`] with the server's list, unsorted.
pub struct TodosQuery {
    api: Arc<dyn TodoApi>,
}

impl TodosQuery {
    pub fn new(api: Arc<dyn TodoApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl QueryFetcher for TodosQuery {
    type Output = Vec<Todo>;

    async fn fetch(&self) -> SyncResult<Vec<Todo>> {
        self.api.list_todos().await
    }
}

/// Populates [`QueryKey::HEALTH`].
pub struct HealthQuery {
    api: Arc<dyn TodoApi>,
}

impl HealthQuery {
    pub fn new(api: Arc<dyn TodoApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl QueryFetcher for HealthQuery {
    type Output = HealthStatus;

    async fn fetch(&self) -> SyncResult<HealthStatus> {
        self.api.fetch_health().await
    }
}

/// Register every query the client reads.
pub fn register_queries(cache: &QueryCache, api: Arc<dyn TodoApi>) {
    cache.register(QueryKey::TODOS, TodosQuery::new(Arc::clone(&api)));
    cache.register(QueryKey::HEALTH, HealthQuery::new(api));
}

pub async fn read_todos(cache: &QueryCache) -> SyncResult<CacheRead<Vec<Todo>>> {
    cache.read(&QueryKey::TODOS).await
}

pub async fn read_health(cache: &QueryCache) -> SyncResult<CacheRead<HealthStatus>> {
    cache.read(&QueryKey::HEALTH).await
}

//! Writes against the remote store, each followed by invalidation of the
//! cache keys it made outdated.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tasklist_cache::QueryCache;
use tasklist_core::{QueryKey, SyncResult, Todo, TodoApi, TodoId};
use tracing::{info, warn};

/// A single write against the remote store.
#[async_trait]
pub trait Mutation: Send + Sync {
    type Output: Send;

    /// Name used in log lines.
    fn name(&self) -> &'static str;

    /// Keys a successful execution makes outdated.
    fn affected_keys(&self) -> Vec<QueryKey>;

    async fn execute(&self) -> SyncResult<Self::Output>;
}

/// Create a todo from a raw title.
pub struct CreateTodo {
    api: Arc<dyn TodoApi>,
    title: String,
}

impl CreateTodo {
    pub fn new(api: Arc<dyn TodoApi>, title: impl Into<String>) -> Self {
        Self {
            api,
            title: title.into(),
        }
    }
}

#[async_trait]
impl Mutation for CreateTodo {
    type Output = Todo;

    fn name(&self) -> &'static str {
        "create_todo"
    }

    fn affected_keys(&self) -> Vec<QueryKey> {
        vec![QueryKey::TODOS]
    }

    async fn execute(&self) -> SyncResult<Todo> {
        self.api.create_todo(&self.title).await
    }
}

/// Set the completion flag of one todo.
pub struct SetCompleted {
    api: Arc<dyn TodoApi>,
    id: TodoId,
    completed: bool,
}

impl SetCompleted {
    pub fn new(api: Arc<dyn TodoApi>, id: TodoId, completed: bool) -> Self {
        Self { api, id, completed }
    }
}

#[async_trait]
impl Mutation for SetCompleted {
    type Output = Todo;

    fn name(&self) -> &'static str {
        "set_completed"
    }

    fn affected_keys(&self) -> Vec<QueryKey> {
        vec![QueryKey::TODOS]
    }

    async fn execute(&self) -> SyncResult<Todo> {
        self.api.set_completed(self.id, self.completed).await
    }
}

/// Runs mutations and keeps the cache consistent with them.
///
/// On success every affected key is invalidated before the result is handed
/// back, so the next read of that key refetches. On failure the cache is not
/// touched.
#[derive(Clone, Debug)]
pub struct MutationCoordinator {
    cache: QueryCache,
    pending: Arc<AtomicUsize>,
}

impl MutationCoordinator {
    pub fn new(cache: QueryCache) -> Self {
        Self {
            cache,
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Number of mutations currently executing.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    pub fn is_pending(&self) -> bool {
        self.pending() > 0
    }

    pub async fn mutate<M: Mutation>(&self, mutation: M) -> SyncResult<M::Output> {
        self.mutate_with(mutation, |_| {}).await
    }

    /// Like [`mutate`](Self::mutate), calling `on_settled` after invalidation
    /// and before returning, whatever the outcome.
    pub async fn mutate_with<M, F>(&self, mutation: M, on_settled: F) -> SyncResult<M::Output>
    where
        M: Mutation,
        F: FnOnce(&SyncResult<M::Output>),
    {
        let name = mutation.name();
        let result = {
            let _pending = PendingGuard::enter(&self.pending);
            mutation.execute().await
        };

        match &result {
            Ok(_) => {
                let keys = mutation.affected_keys();
                for key in &keys {
                    self.cache.invalidate(key);
                }
                info!(mutation = name, invalidated = keys.len(), "mutation succeeded");
            }
            Err(err) => {
                warn!(mutation = name, error = %err, kind = ?err.kind(), "mutation failed");
            }
        }

        on_settled(&result);
        result
    }
}

/// Counts a mutation as pending until dropped, including on cancellation.
struct PendingGuard<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> PendingGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self { counter }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::AcqRel);
    }
}

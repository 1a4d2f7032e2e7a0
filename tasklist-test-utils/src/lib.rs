//! Task-list Test Utilities
//!
//! Shared test infrastructure for the workspace:
//! - An in-memory [`TodoApi`] fake with call counters and failure injection
//! - Fixtures for todos and health payloads
//! - Proptest generators

pub use tasklist_core::{
    DatabaseInfo, ErrorKind, HealthStatus, NewTodo, QueryKey, SyncError, SyncResult, Todo,
    TodoApi, TodoId,
};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// IN-MEMORY REMOTE STORE
// ============================================================================

/// Remote operations the fake counts and can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Health,
    List,
    Create,
    SetCompleted,
}

#[derive(Debug, Default)]
struct FakeState {
    todos: Vec<Todo>,
    next_id: TodoId,
    failures: HashMap<Operation, VecDeque<SyncError>>,
    latency: Duration,
}

/// In-memory stand-in for the remote store.
///
/// Behaves like the HTTP backend: ids are assigned on create, unknown ids
/// fail updates with `NotFound`, and lists come back in storage order.
#[derive(Debug, Default)]
pub struct InMemoryTodoApi {
    state: Mutex<FakeState>,
    health_calls: AtomicUsize,
    list_calls: AtomicUsize,
    create_calls: AtomicUsize,
    update_calls: AtomicUsize,
}

impl InMemoryTodoApi {
    pub fn new() -> Self {
        Self::with_todos(Vec::new())
    }

    /// Start from `todos`, stored and listed in the given order.
    pub fn with_todos(todos: Vec<Todo>) -> Self {
        let next_id = todos.iter().map(|t| t.id).max().unwrap_or(0) + 1;
        Self {
            state: Mutex::new(FakeState {
                todos,
                next_id,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// The three todos the development backend starts with.
    pub fn seeded() -> Self {
        Self::with_todos(vec![
            todo(1, "Learn FastAPI", false),
            todo(2, "Build Todo App", false),
            todo(3, "Deploy to Kubernetes", false),
        ])
    }

    /// Delay every operation by `latency` before it runs.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    /// Make the next call to `operation` fail with `error`. Queued failures
    /// are consumed in order.
    pub fn fail_next(&self, operation: Operation, error: SyncError) {
        self.lock()
            .failures
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Number of calls that reached `operation`.
    pub fn calls(&self, operation: Operation) -> usize {
        self.counter(operation).load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        [
            Operation::Health,
            Operation::List,
            Operation::Create,
            Operation::SetCompleted,
        ]
        .into_iter()
        .map(|op| self.calls(op))
        .sum()
    }

    /// Current server-side todos, in storage order.
    pub fn snapshot(&self) -> Vec<Todo> {
        self.lock().todos.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn counter(&self, operation: Operation) -> &AtomicUsize {
        match operation {
            Operation::Health => &self.health_calls,
            Operation::List => &self.list_calls,
            Operation::Create => &self.create_calls,
            Operation::SetCompleted => &self.update_calls,
        }
    }

    /// Count the call, wait out the latency, and pop an injected failure.
    async fn enter(&self, operation: Operation) -> SyncResult<()> {
        self.counter(operation).fetch_add(1, Ordering::SeqCst);
        let latency = self.lock().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        match self
            .lock()
            .failures
            .get_mut(&operation)
            .and_then(VecDeque::pop_front)
        {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl TodoApi for InMemoryTodoApi {
    async fn fetch_health(&self) -> SyncResult<HealthStatus> {
        self.enter(Operation::Health).await?;
        Ok(health("healthy"))
    }

    async fn list_todos(&self) -> SyncResult<Vec<Todo>> {
        self.enter(Operation::List).await?;
        Ok(self.snapshot())
    }

    async fn create(&self, new: NewTodo) -> SyncResult<Todo> {
        self.enter(Operation::Create).await?;
        let mut state = self.lock();
        let created = Todo {
            id: state.next_id,
            title: new.title().to_string(),
            completed: new.completed(),
            created_at: Utc::now(),
        };
        state.next_id += 1;
        state.todos.push(created.clone());
        Ok(created)
    }

    async fn set_completed(&self, id: TodoId, completed: bool) -> SyncResult<Todo> {
        self.enter(Operation::SetCompleted).await?;
        let mut state = self.lock();
        let todo = state
            .todos
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(SyncError::NotFound { id })?;
        todo.completed = completed;
        Ok(todo.clone())
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

/// A todo with a fixed creation timestamp.
pub fn todo(id: TodoId, title: &str, completed: bool) -> Todo {
    Todo {
        id,
        title: title.to_string(),
        completed,
        created_at: Utc
            .with_ymd_and_hms(2025, 1, 1, 9, 0, 0)
            .single()
            .unwrap_or_default(),
    }
}

/// A health payload with the given status and a local database.
pub fn health(status: &str) -> HealthStatus {
    HealthStatus {
        status: status.to_string(),
        database: Some(DatabaseInfo {
            kind: "postgresql".to_string(),
            managed: false,
            host: "localhost".to_string(),
        }),
    }
}

// ============================================================================
// GENERATORS
// ============================================================================

/// Titles the remote store accepts.
pub fn arb_title() -> impl Strategy<Value = String> {
    "[A-Za-z0-9][A-Za-z0-9 .,!?-]{0,60}"
}

/// Todos with distinct ids, in arbitrary order.
pub fn arb_todo_list() -> impl Strategy<Value = Vec<Todo>> {
    proptest::collection::btree_map(1..10_000i64, (arb_title(), any::<bool>()), 0..16)
        .prop_map(|by_id| {
            by_id
                .into_iter()
                .map(|(id, (title, completed))| todo(id, &title, completed))
                .collect::<Vec<_>>()
        })
        .prop_shuffle()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_assigns_next_id() {
        let api = InMemoryTodoApi::seeded();
        let created = api.create_todo("Buy milk").await.unwrap();
        assert_eq!(created.id, 4);
        assert!(!created.completed);
        assert_eq!(api.snapshot().len(), 4);
    }

    #[tokio::test]
    async fn test_invalid_title_never_reaches_the_store() {
        let api = InMemoryTodoApi::seeded();
        let err = api.create_todo("   ").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(api.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let api = InMemoryTodoApi::seeded();
        let err = api.set_completed(99, true).await.unwrap_err();
        assert_eq!(err, SyncError::NotFound { id: 99 });
        assert_eq!(api.calls(Operation::SetCompleted), 1);
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed_in_order() {
        let api = InMemoryTodoApi::seeded();
        api.fail_next(Operation::List, SyncError::network("reset"));
        api.fail_next(Operation::List, SyncError::server(500, "boom"));

        assert_eq!(api.list_todos().await.unwrap_err().kind(), ErrorKind::Network);
        assert_eq!(api.list_todos().await.unwrap_err().kind(), ErrorKind::Server);
        assert_eq!(api.list_todos().await.unwrap().len(), 3);
        assert_eq!(api.calls(Operation::List), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_delays_calls() {
        let api = InMemoryTodoApi::seeded();
        api.set_latency(Duration::from_secs(2));
        let started = tokio::time::Instant::now();
        api.fetch_health().await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(2));
    }
}

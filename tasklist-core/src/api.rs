//! Remote store contract.

use async_trait::async_trait;

use crate::entities::{NewTodo, Todo, TodoId};
use crate::error::SyncResult;
use crate::health::HealthStatus;

/// Typed operations against the remote todo store.
///
/// Implementations own no client-side state: they either return the server's
/// value or fail. They never touch a cache.
#[async_trait]
pub trait TodoApi: Send + Sync {
    /// `GET /health`.
    async fn fetch_health(&self) -> SyncResult<HealthStatus>;

    /// `GET /api/todos`, in whatever order the server returns.
    async fn list_todos(&self) -> SyncResult<Vec<Todo>>;

    /// `POST /api/todos` with an already validated body.
    async fn create(&self, new: NewTodo) -> SyncResult<Todo>;

    /// `PUT /api/todos/{id}` with `{completed}`.
    async fn set_completed(&self, id: TodoId, completed: bool) -> SyncResult<Todo>;

    /// Validate `title` locally, then create it.
    ///
    /// An invalid title fails with a validation error before any request.
    async fn create_todo(&self, title: &str) -> SyncResult<Todo> {
        let new = NewTodo::new(title)?;
        self.create(new).await
    }
}

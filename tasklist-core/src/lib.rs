//! Task-list Core - Entity Types
//!
//! Data structures shared by the cache, the remote client and the views, plus
//! the [`TodoApi`] trait the remote client implements. Nothing in this crate
//! performs I/O.

pub mod api;
pub mod entities;
pub mod error;
pub mod health;
pub mod query;

pub use api::TodoApi;
pub use entities::{sort_for_display, NewTodo, Todo, TodoId, TodoUpdate, TITLE_MAX_CHARS};
pub use error::{ErrorKind, SyncError, SyncResult};
pub use health::{DatabaseInfo, HealthStatus};
pub use query::QueryKey;

/// Timestamp type using UTC timezone.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

//! Todo entity and the request bodies the remote store accepts.

use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};
use crate::Timestamp;

/// Server-assigned todo identifier.
pub type TodoId = i64;

/// Longest title the remote store accepts, in characters.
pub const TITLE_MAX_CHARS: usize = 100;

/// A todo item as returned by the remote store.
///
/// The remote store is authoritative: the client only ever holds copies of
/// this value, and the only field it asks the server to change is `completed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: TodoId,
    pub title: String,
    pub completed: bool,
    /// Timestamps without an offset are taken as UTC.
    #[serde(deserialize_with = "lenient_timestamp::deserialize")]
    pub created_at: Timestamp,
}

/// Body of a create request.
///
/// Can only be built through [`NewTodo::new`], so every value that reaches the
/// wire has already passed title validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewTodo {
    title: String,
    completed: bool,
}

impl NewTodo {
    /// Validate and normalize a title for creation.
    ///
    /// Surrounding whitespace is trimmed. The result must be non-empty and at
    /// most [`TITLE_MAX_CHARS`] characters long.
    pub fn new(title: &str) -> SyncResult<Self> {
        let title = title.trim();
        if title.is_empty() {
            return Err(SyncError::validation("title", "must not be empty"));
        }
        let chars = title.chars().count();
        if chars > TITLE_MAX_CHARS {
            return Err(SyncError::validation(
                "title",
                format!("must be at most {TITLE_MAX_CHARS} characters, got {chars}"),
            ));
        }
        Ok(Self {
            title: title.to_string(),
            completed: false,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn completed(&self) -> bool {
        self.completed
    }
}

/// Body of an update request. Only the completion flag is mutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoUpdate {
    pub completed: bool,
}

/// Order todos for display (ascending id).
///
/// The cache stores lists exactly as the server returned them; this is the
/// consumer-side transform. Applying it twice is the same as applying it once.
pub fn sort_for_display(todos: &mut [Todo]) {
    todos.sort_by_key(|todo| todo.id);
}

mod lenient_timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer};

    use crate::Timestamp;

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Timestamp, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse(raw: &str) -> Result<Timestamp, chrono::ParseError> {
        match DateTime::parse_from_rfc3339(raw) {
            Ok(parsed) => Ok(parsed.with_timezone(&Utc)),
            Err(err) => NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .map(|naive| naive.and_utc())
                .map_err(|_| err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn todo(id: TodoId) -> Todo {
        Todo {
            id,
            title: format!("todo {id}"),
            completed: false,
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_new_todo_trims_title() {
        let new = NewTodo::new("  Buy milk \n").unwrap();
        assert_eq!(new.title(), "Buy milk");
        assert!(!new.completed());
    }

    #[test]
    fn test_new_todo_rejects_empty_and_blank() {
        for title in ["", "   ", "\t\n"] {
            let err = NewTodo::new(title).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
    }

    #[test]
    fn test_new_todo_rejects_overlong_title() {
        let title = "x".repeat(TITLE_MAX_CHARS + 1);
        let err = NewTodo::new(&title).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(NewTodo::new(&"x".repeat(TITLE_MAX_CHARS)).is_ok());
    }

    #[test]
    fn test_new_todo_wire_shape() {
        let body = serde_json::to_value(NewTodo::new("Buy milk").unwrap()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "title": "Buy milk", "completed": false })
        );
    }

    #[test]
    fn test_todo_deserializes_server_shape() {
        let raw = r#"{"id":7,"title":"Deploy","completed":true,"created_at":"2025-03-01T12:30:00Z"}"#;
        let parsed: Todo = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.id, 7);
        assert!(parsed.completed);
        assert_eq!(
            parsed.created_at,
            Utc.with_ymd_and_hms(2025, 3, 1, 12, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_naive_created_at_is_utc() {
        let raw = r#"[
            {"id":1,"title":"a","completed":false,"created_at":"2025-03-01T12:30:00.123456"},
            {"id":2,"title":"b","completed":false,"created_at":"2025-03-01T14:30:00+02:00"}
        ]"#;
        let parsed: Vec<Todo> = serde_json::from_str(raw).unwrap();
        let expected = Utc.with_ymd_and_hms(2025, 3, 1, 12, 30, 0).unwrap()
            + chrono::Duration::microseconds(123_456);
        assert_eq!(parsed[0].created_at, expected);
        assert_eq!(
            parsed[1].created_at,
            Utc.with_ymd_and_hms(2025, 3, 1, 12, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_garbage_created_at_rejected() {
        assert!(lenient_timestamp::parse("yesterday").is_err());
        let raw = r#"{"id":1,"title":"a","completed":false,"created_at":"2025-03-01"}"#;
        assert!(serde_json::from_str::<Todo>(raw).is_err());
    }

    #[test]
    fn test_sort_for_display_orders_by_id() {
        let mut todos = vec![todo(2), todo(1), todo(3)];
        sort_for_display(&mut todos);
        let ids: Vec<_> = todos.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    proptest! {
        #[test]
        fn sort_for_display_is_idempotent(ids in proptest::collection::vec(any::<i64>(), 0..32)) {
            let mut once: Vec<Todo> = ids.iter().copied().map(todo).collect();
            sort_for_display(&mut once);
            let mut twice = once.clone();
            sort_for_display(&mut twice);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn titles_with_content_are_accepted(title in "[a-zA-Z0-9][a-zA-Z0-9 ]{0,98}") {
            let new = NewTodo::new(&title).unwrap();
            prop_assert_eq!(new.title(), title.trim());
        }
    }
}

//! Notification system for the client.
//!
//! Every notification can be dismissed by id and closes on its own once its
//! lifetime has passed.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tasklist_core::{ErrorKind, SyncError};

pub const CREATE_SUCCEEDED: &str = "Todo created successfully";
pub const CREATE_FAILED: &str = "Failed to create todo";
pub const UPDATE_SUCCEEDED: &str = "Todo updated successfully";
pub const UPDATE_FAILED: &str = "Failed to update todo";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
    Success,
}

impl NotificationLevel {
    pub fn label(self) -> &'static str {
        match self {
            NotificationLevel::Info => "info",
            NotificationLevel::Warning => "warning",
            NotificationLevel::Error => "error",
            NotificationLevel::Success => "success",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub id: u64,
    pub level: NotificationLevel,
    pub message: String,
    /// Extra context, such as the reason a request failed.
    pub detail: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Notification {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone)]
pub struct NotificationCenter {
    auto_close: Duration,
    next_id: u64,
    active: Vec<Notification>,
}

impl NotificationCenter {
    pub fn new(auto_close: Duration) -> Self {
        Self {
            auto_close,
            next_id: 1,
            active: Vec::new(),
        }
    }

    /// Show a notification and return its id.
    pub fn push(
        &mut self,
        level: NotificationLevel,
        message: impl Into<String>,
        detail: Option<String>,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        let created_at = Utc::now();
        let lifetime = chrono::Duration::from_std(self.auto_close)
            .unwrap_or_else(|_| chrono::Duration::seconds(2));
        self.active.push(Notification {
            id,
            level,
            message: message.into(),
            detail,
            created_at,
            expires_at: created_at + lifetime,
        });
        id
    }

    pub fn success(&mut self, message: impl Into<String>) -> u64 {
        self.push(NotificationLevel::Success, message, None)
    }

    /// Report a failed operation, with a reason derived from the error.
    pub fn failure(&mut self, message: impl Into<String>, err: &SyncError) -> u64 {
        self.push(NotificationLevel::Error, message, Some(describe_failure(err)))
    }

    /// Remove the notification with `id`. Returns whether it was showing.
    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.active.len();
        self.active.retain(|n| n.id != id);
        self.active.len() != before
    }

    /// Close notifications whose lifetime has passed. Returns how many closed.
    pub fn expire(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.active.len();
        self.active.retain(|n| !n.is_expired(now));
        before - self.active.len()
    }

    pub fn active(&self) -> &[Notification] {
        &self.active
    }

    pub fn latest(&self) -> Option<&Notification> {
        self.active.last()
    }
}

/// Short, user-facing reason for a failed request.
pub fn describe_failure(err: &SyncError) -> String {
    match err {
        SyncError::Validation { field, reason } => format!("{field} {reason}"),
        SyncError::NotFound { id } => format!("Todo {id} no longer exists"),
        _ => match err.kind() {
            ErrorKind::Network => "Could not reach the server".to_string(),
            ErrorKind::Server => format!("Server rejected the request ({err})"),
            _ => err.to_string(),
        },
    }
}

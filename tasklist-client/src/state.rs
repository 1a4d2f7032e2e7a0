//! Application state and view state definitions.

use std::sync::Arc;

use chrono::Utc;
use tasklist_cache::{CacheConfig, CacheRead, QueryCache, ReadOptions, Subscription};
use tasklist_core::{
    sort_for_display, HealthStatus, QueryKey, SyncError, SyncResult, Timestamp, Todo, TodoApi,
    TodoId,
};
use tracing::warn;

use crate::config::ClientConfig;
use crate::mutation::{CreateTodo, MutationCoordinator, SetCompleted};
use crate::notifications::{
    describe_failure, NotificationCenter, CREATE_FAILED, CREATE_SUCCEEDED, UPDATE_FAILED,
    UPDATE_SUCCEEDED,
};
use crate::queries::{read_health, read_todos, register_queries};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Loaded,
    Failed(String),
}

/// The todo list as displayed: sorted by id, with its load state.
#[derive(Debug, Clone)]
pub struct TodoListView {
    pub todos: Vec<Todo>,
    pub load_state: LoadState,
    pub fetched_at: Option<Timestamp>,
}

impl TodoListView {
    pub fn new() -> Self {
        Self {
            todos: Vec::new(),
            load_state: LoadState::Loading,
            fetched_at: None,
        }
    }

    /// Show the outcome of a read. A failed read keeps the rows already shown.
    pub fn apply(&mut self, result: SyncResult<CacheRead<Vec<Todo>>>) {
        match result {
            Ok(read) => {
                self.fetched_at = Some(read.fetched_at());
                let mut todos = read.into_value();
                sort_for_display(&mut todos);
                self.todos = todos;
                self.load_state = LoadState::Loaded;
            }
            Err(err) => self.load_state = LoadState::Failed(describe_failure(&err)),
        }
    }

    pub fn get(&self, id: TodoId) -> Option<&Todo> {
        self.todos.iter().find(|t| t.id == id)
    }

    pub fn completed_count(&self) -> usize {
        self.todos.iter().filter(|t| t.completed).count()
    }

    pub fn lines(&self) -> Vec<String> {
        if self.todos.is_empty() {
            let line = match &self.load_state {
                LoadState::Loading => "Loading todos...".to_string(),
                LoadState::Failed(reason) => format!("Error loading todos: {reason}"),
                LoadState::Loaded => "No todos yet. Create one!".to_string(),
            };
            return vec![line];
        }

        let mut lines: Vec<String> = self
            .todos
            .iter()
            .map(|t| {
                let mark = if t.completed { 'x' } else { ' ' };
                format!("[{mark}] #{} {}", t.id, t.title)
            })
            .collect();
        lines.push(format!(
            "{} of {} done",
            self.completed_count(),
            self.todos.len()
        ));
        if let LoadState::Failed(reason) = &self.load_state {
            lines.push(format!("(showing last loaded list: {reason})"));
        }
        lines
    }
}

impl Default for TodoListView {
    fn default() -> Self {
        Self::new()
    }
}

/// Title input for new todos.
#[derive(Debug, Clone, Default)]
pub struct TodoForm {
    pub title: String,
    /// Set while a create is in flight.
    pub submitting: bool,
}

#[derive(Debug, Clone, Default)]
pub struct HealthBanner {
    pub health: Option<HealthStatus>,
    pub error: Option<String>,
}

impl HealthBanner {
    pub fn apply(&mut self, result: SyncResult<CacheRead<HealthStatus>>) {
        match result {
            Ok(read) => {
                self.health = Some(read.into_value());
                self.error = None;
            }
            Err(err) => self.error = Some(describe_failure(&err)),
        }
    }

    pub fn line(&self) -> String {
        match (&self.health, &self.error) {
            (_, Some(reason)) => format!("API: unreachable ({reason})"),
            (Some(health), None) => format!("API: {}", health.summary()),
            (None, None) => "API: checking...".to_string(),
        }
    }
}

pub struct App {
    pub config: ClientConfig,
    pub api: Arc<dyn TodoApi>,
    pub cache: QueryCache,
    pub mutations: MutationCoordinator,
    pub notifications: NotificationCenter,
    pub list: TodoListView,
    pub form: TodoForm,
    pub health: HealthBanner,
}

impl App {
    pub fn new(config: ClientConfig, api: Arc<dyn TodoApi>) -> Self {
        let cache = QueryCache::new(CacheConfig::new().with_browser_context(config.browser_context));
        register_queries(&cache, Arc::clone(&api));
        let notifications = NotificationCenter::new(config.notification_auto_close());
        Self {
            config,
            api,
            mutations: MutationCoordinator::new(cache.clone()),
            cache,
            notifications,
            list: TodoListView::new(),
            form: TodoForm::default(),
            health: HealthBanner::default(),
        }
    }

    pub async fn refresh_list(&mut self) -> SyncResult<()> {
        let result = read_todos(&self.cache).await;
        let outcome = result.as_ref().map(|_| ()).map_err(Clone::clone);
        self.list.apply(result);
        outcome
    }

    pub async fn refresh_health(&mut self) -> SyncResult<()> {
        let result = read_health(&self.cache).await;
        let outcome = result.as_ref().map(|_| ()).map_err(Clone::clone);
        self.health.apply(result);
        outcome
    }

    /// Create a todo from the form's title.
    ///
    /// On success the input is cleared and the list reloaded. On failure the
    /// input and the list are left as they were.
    pub async fn submit_form(&mut self) -> SyncResult<Todo> {
        self.form.submitting = true;
        let mutation = CreateTodo::new(Arc::clone(&self.api), self.form.title.clone());
        let notifications = &mut self.notifications;
        let result = self
            .mutations
            .mutate_with(mutation, |outcome| match outcome {
                Ok(_) => {
                    notifications.success(CREATE_SUCCEEDED);
                }
                Err(err) => {
                    notifications.failure(CREATE_FAILED, err);
                }
            })
            .await;
        self.form.submitting = false;

        if result.is_ok() {
            self.form.title.clear();
            self.reload_after_write().await;
        }
        result
    }

    /// Flip the completion flag of a todo currently in the list.
    pub async fn toggle(&mut self, id: TodoId) -> SyncResult<Todo> {
        match self.list.get(id).map(|t| t.completed) {
            Some(completed) => self.set_completed(id, !completed).await,
            None => {
                let err = SyncError::NotFound { id };
                self.notifications.failure(UPDATE_FAILED, &err);
                Err(err)
            }
        }
    }

    pub async fn set_completed(&mut self, id: TodoId, completed: bool) -> SyncResult<Todo> {
        let mutation = SetCompleted::new(Arc::clone(&self.api), id, completed);
        let notifications = &mut self.notifications;
        let result = self
            .mutations
            .mutate_with(mutation, |outcome| match outcome {
                Ok(_) => {
                    notifications.success(UPDATE_SUCCEEDED);
                }
                Err(err) => {
                    notifications.failure(UPDATE_FAILED, err);
                }
            })
            .await;

        if result.is_ok() {
            self.reload_after_write().await;
        }
        result
    }

    /// Follow the todo list, refreshing it on the configured interval.
    pub fn subscribe_list(&self) -> SyncResult<Subscription> {
        let options = match self.config.refresh_interval() {
            Some(interval) => ReadOptions::refresh_every(interval),
            None => ReadOptions::new(),
        };
        self.cache.subscribe(&QueryKey::TODOS, options)
    }

    /// Follow the API health, refreshing it on the health interval.
    pub fn subscribe_health(&self) -> SyncResult<Subscription> {
        let options = ReadOptions::refresh_every(self.config.health_refresh_interval());
        self.cache.subscribe(&QueryKey::HEALTH, options)
    }

    /// Close notifications whose lifetime has passed.
    pub fn expire_notifications(&mut self) -> usize {
        self.notifications.expire(Utc::now())
    }

    /// Cancel background refresh. Call before exit.
    pub fn shutdown(&self) {
        self.cache.shutdown();
    }

    async fn reload_after_write(&mut self) {
        if let Err(err) = self.refresh_list().await {
            warn!(error = %err, "reloading todos after a write failed");
        }
    }
}

//! REST client for the todo backend.

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tasklist_core::{HealthStatus, NewTodo, SyncError, SyncResult, Todo, TodoApi, TodoId, TodoUpdate};
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::error::ClientError;

/// Error body returned by the backend on validation and lookup failures.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

#[derive(Clone, Debug)]
pub struct RestClient {
    client: reqwest::Client,
    base_url: String,
}

impl RestClient {
    pub fn new(base_url: &str, timeout: Duration) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        let base_url = config.resolve_base_url()?;
        info!(base_url = %base_url, "using todo backend");
        Ok(Self::new(&base_url, config.request_timeout())?)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T>(&self, path: &str) -> SyncResult<T>
    where
        T: DeserializeOwned,
    {
        self.send_json::<T, ()>(Method::GET, path, None, None).await
    }

    async fn post_json<T, B>(&self, path: &str, body: &B) -> SyncResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send_json(Method::POST, path, Some(body), None).await
    }

    async fn put_json<T, B>(&self, path: &str, body: &B, id: TodoId) -> SyncResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send_json(Method::PUT, path, Some(body), Some(id)).await
    }

    /// `target` names the todo a 404 refers to.
    async fn send_json<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        target: Option<TodoId>,
    ) -> SyncResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!(method = %method, url = %url, "sending request");
        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await.map_err(transport_error)?;
        parse_response(response, target).await
    }
}

async fn parse_response<T: DeserializeOwned>(
    response: reqwest::Response,
    target: Option<TodoId>,
) -> SyncResult<T> {
    let status = response.status();
    debug!(status = status.as_u16(), "received response");
    if status.is_success() {
        let bytes = response.bytes().await.map_err(transport_error)?;
        return serde_json::from_slice::<T>(&bytes).map_err(|e| {
            SyncError::server(
                status.as_u16(),
                format!("undecodable response body: {e}"),
            )
        });
    }
    if status == StatusCode::NOT_FOUND {
        if let Some(id) = target {
            return Err(SyncError::NotFound { id });
        }
    }
    let text = response.text().await.unwrap_or_default();
    let body = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(ErrorBody {
            detail: serde_json::Value::String(detail),
        }) => detail,
        Ok(ErrorBody { detail }) => detail.to_string(),
        Err(_) => text,
    };
    Err(SyncError::server(status.as_u16(), body))
}

fn transport_error(err: reqwest::Error) -> SyncError {
    if err.is_timeout() {
        SyncError::network("request timed out")
    } else if err.is_connect() {
        SyncError::network(format!("connection failed: {err}"))
    } else {
        SyncError::network(err.to_string())
    }
}

#[async_trait]
impl TodoApi for RestClient {
    async fn fetch_health(&self) -> SyncResult<HealthStatus> {
        self.get_json("/health").await
    }

    async fn list_todos(&self) -> SyncResult<Vec<Todo>> {
        self.get_json("/api/todos").await
    }

    async fn create(&self, new: NewTodo) -> SyncResult<Todo> {
        let created: Todo = self.post_json("/api/todos", &new).await?;
        info!(todo_id = created.id, "todo created");
        Ok(created)
    }

    async fn set_completed(&self, id: TodoId, completed: bool) -> SyncResult<Todo> {
        let path = format!("/api/todos/{id}");
        let updated: Todo = self.put_json(&path, &TodoUpdate { completed }, id).await?;
        info!(todo_id = id, completed, "todo updated");
        Ok(updated)
    }
}

//! Configuration loading for the task-list client.
//!
//! Every field has a default, so running without a config file talks to a
//! local development backend.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Url;

/// Backend address used when nothing else is configured.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ClientConfig {
    /// Explicit backend address.
    pub api_base_url: Option<String>,
    /// Origin of the page hosting the client, when embedded in one.
    pub page_origin: Option<String>,
    /// Long-lived interactive context. Periodic refresh only runs when set.
    pub browser_context: bool,
    pub request_timeout_ms: u64,
    /// Refresh period for the todo list while it is being watched.
    pub refresh_interval_ms: Option<u64>,
    /// Refresh period for the API health banner while it is being watched.
    pub health_refresh_interval_ms: u64,
    pub notification_auto_close_ms: u64,
    pub log_format: LogFormat,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            page_origin: None,
            browser_context: true,
            request_timeout_ms: 15_000,
            refresh_interval_ms: None,
            health_refresh_interval_ms: 30_000,
            notification_auto_close_ms: 2_000,
            log_format: LogFormat::Text,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ClientConfig {
    /// Load from `--config <path>` or `TASKLIST_CONFIG`, falling back to
    /// defaults when neither is given.
    pub fn load() -> Result<Self, ConfigError> {
        let config = match config_path_from_args().or_else(config_path_from_env) {
            Some(path) => Self::from_path(&path)?,
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(url) = &self.api_base_url {
            parse_http_url("api_base_url", url)?;
        }
        if let Some(origin) = &self.page_origin {
            parse_http_url("page_origin", origin)?;
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.refresh_interval_ms == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "refresh_interval_ms",
                reason: "must be > 0 when set".to_string(),
            });
        }
        if self.health_refresh_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "health_refresh_interval_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.notification_auto_close_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "notification_auto_close_ms",
                reason: "must be > 0".to_string(),
            });
        }
        Ok(())
    }

    /// Backend address, resolved once at start-up.
    ///
    /// A client served from a non-localhost page talks to its own origin.
    /// Otherwise the explicit `api_base_url` wins, then the development
    /// default.
    pub fn resolve_base_url(&self) -> Result<String, ConfigError> {
        if self.browser_context {
            if let Some(origin) = &self.page_origin {
                let url = parse_http_url("page_origin", origin)?;
                if url.host_str() != Some("localhost") {
                    return Ok(trim_base(origin));
                }
            }
        }
        match &self.api_base_url {
            Some(url) => {
                parse_http_url("api_base_url", url)?;
                Ok(trim_base(url))
            }
            None => Ok(DEFAULT_API_BASE_URL.to_string()),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        self.refresh_interval_ms.map(Duration::from_millis)
    }

    pub fn health_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.health_refresh_interval_ms)
    }

    pub fn notification_auto_close(&self) -> Duration {
        Duration::from_millis(self.notification_auto_close_ms)
    }
}

fn parse_http_url(field: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::InvalidValue {
            field,
            reason: "must not be empty".to_string(),
        });
    }
    let url = Url::parse(trimmed).map_err(|e| ConfigError::InvalidValue {
        field,
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::InvalidValue {
            field,
            reason: format!("unsupported scheme '{other}'"),
        }),
    }
}

fn trim_base(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var("TASKLIST_CONFIG").ok().map(PathBuf::from)
}

fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = ClientConfig::from_toml_str("").unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.resolve_base_url().unwrap(), DEFAULT_API_BASE_URL);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let err = ClientConfig::from_toml_str("api_key = \"secret\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_log_format_parses_lowercase() {
        let config = ClientConfig::from_toml_str("log_format = \"json\"").unwrap();
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_explicit_base_url_is_trimmed() {
        let config = ClientConfig {
            api_base_url: Some("http://todo.internal:9000/".to_string()),
            ..Default::default()
        };
        assert_eq!(config.resolve_base_url().unwrap(), "http://todo.internal:9000");
    }

    #[test]
    fn test_remote_page_origin_wins_in_browser_context() {
        let config = ClientConfig {
            api_base_url: Some("http://localhost:8000".to_string()),
            page_origin: Some("https://todos.example.com".to_string()),
            ..Default::default()
        };
        assert_eq!(config.resolve_base_url().unwrap(), "https://todos.example.com");
    }

    #[test]
    fn test_localhost_page_origin_falls_through() {
        let config = ClientConfig {
            api_base_url: Some("http://127.0.0.1:8000".to_string()),
            page_origin: Some("http://localhost:3000".to_string()),
            ..Default::default()
        };
        assert_eq!(config.resolve_base_url().unwrap(), "http://127.0.0.1:8000");
    }

    #[test]
    fn test_page_origin_ignored_outside_browser_context() {
        let config = ClientConfig {
            page_origin: Some("https://todos.example.com".to_string()),
            browser_context: false,
            ..Default::default()
        };
        assert_eq!(config.resolve_base_url().unwrap(), DEFAULT_API_BASE_URL);
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = ClientConfig {
            request_timeout_ms: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "request_timeout_ms", .. })
        ));
    }

    #[test]
    fn test_health_polls_every_thirty_seconds_by_default() {
        let config = ClientConfig::default();
        assert_eq!(config.health_refresh_interval(), Duration::from_secs(30));
        assert_eq!(config.refresh_interval(), None);

        let config = ClientConfig::from_toml_str("health_refresh_interval_ms = 5000").unwrap();
        assert_eq!(config.health_refresh_interval(), Duration::from_secs(5));

        let config = ClientConfig {
            health_refresh_interval_ms: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "health_refresh_interval_ms", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_scheme() {
        let config = ClientConfig {
            api_base_url: Some("ftp://localhost".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}

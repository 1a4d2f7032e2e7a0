//! Health check payload reported by the remote store.

use serde::{Deserialize, Serialize};

/// Response of `GET /health`.
///
/// Older backends report only `status`, so `database` may be absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseInfo>,
}

/// Which database the remote store runs against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseInfo {
    #[serde(rename = "type")]
    pub kind: String,
    pub managed: bool,
    pub host: String,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status.eq_ignore_ascii_case("healthy")
    }

    /// One-line description for a status banner.
    pub fn summary(&self) -> String {
        match &self.database {
            Some(db) => {
                let managed = if db.managed { "managed" } else { "self-hosted" };
                format!("{} ({} {}, {})", self.status, managed, db.kind, db.host)
            }
            None => format!("{} (database unknown)", self.status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_roundtrips_type_field() {
        let raw = r#"{"status":"healthy","database":{"type":"postgresql","managed":true,"host":"db.internal"}}"#;
        let health: HealthStatus = serde_json::from_str(raw).unwrap();
        assert!(health.is_healthy());
        assert_eq!(health.database.as_ref().unwrap().kind, "postgresql");

        let back = serde_json::to_value(&health).unwrap();
        assert_eq!(back["database"]["type"], "postgresql");
    }

    #[test]
    fn test_summary() {
        let health = HealthStatus {
            status: "healthy".to_string(),
            database: Some(DatabaseInfo {
                kind: "sqlite".to_string(),
                managed: false,
                host: "localhost".to_string(),
            }),
        };
        assert_eq!(health.summary(), "healthy (self-hosted sqlite, localhost)");
    }

    #[test]
    fn test_status_only_payload() {
        let health: HealthStatus = serde_json::from_str(r#"{"status":"healthy"}"#).unwrap();
        assert!(health.is_healthy());
        assert_eq!(health.database, None);
        assert_eq!(health.summary(), "healthy (database unknown)");
        assert_eq!(serde_json::to_string(&health).unwrap(), r#"{"status":"healthy"}"#);
    }
}

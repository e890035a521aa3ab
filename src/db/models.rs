use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Provider,
    Module,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobItemStatus {
    Pending,
    Downloading,
    Completed,
    Failed,
}

/// Identity of an in-flight or stored artifact, shared by job items,
/// the auto-download coordinator, and the protocol layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Identity {
    Provider {
        namespace: String,
        r#type: String,
        version: String,
        os: String,
        arch: String,
    },
    Module {
        namespace: String,
        name: String,
        system: String,
        version: String,
    },
}

impl Identity {
    pub fn kind(&self) -> JobKind {
        match self {
            Identity::Provider { .. } => JobKind::Provider,
            Identity::Module { .. } => JobKind::Module,
        }
    }

    pub fn namespace(&self) -> &str {
        match self {
            Identity::Provider { namespace, .. } => namespace,
            Identity::Module { namespace, .. } => namespace,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct ProviderRecord {
    pub id: i64,
    pub namespace: String,
    pub r#type: String,
    pub version: String,
    pub os: String,
    pub arch: String,
    pub filename: String,
    pub download_url: String,
    pub shasum: String,
    pub storage_key: String,
    pub byte_size: i64,
    pub deprecated: bool,
    pub blocked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct ModuleRecord {
    pub id: i64,
    pub namespace: String,
    pub name: String,
    pub system: String,
    pub version: String,
    pub storage_key: String,
    pub filename: String,
    pub byte_size: i64,
    pub source_url: String,
    pub deprecated: bool,
    pub blocked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub kind: JobKind,
    pub source: String,
    pub status: JobStatus,
    pub total: i64,
    pub completed: i64,
    pub failed: i64,
    pub progress: i64,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct JobItem {
    pub id: i64,
    pub job_id: String,
    pub seq: i64,
    pub namespace: String,
    pub name: String,
    pub system_or_type: String,
    pub version: String,
    pub platform: Option<String>,
    pub status: JobItemStatus,
    pub provider_id: Option<i64>,
    pub module_id: Option<i64>,
    pub retry_count: i64,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub jti: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub actor: String,
    pub action: String,
    pub resource: String,
    pub success: bool,
    pub ip: Option<String>,
    pub metadata: Option<String>,
    pub created_at: DateTime<Utc>,
}

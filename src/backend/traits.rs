//! Hosting service interface and deployment data model

use async_trait::async_trait;
use axum::body::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::error::Result;

/// Lifecycle state of a deployment as reported by the hosting service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeploymentStatus {
    Creating,
    InService,
    Failed,
    Updating,
    Deleting,
    /// Any state this gateway does not route to by name
    Other(String),
}

impl DeploymentStatus {
    pub fn is_in_service(&self) -> bool {
        matches!(self, DeploymentStatus::InService)
    }

    pub fn as_str(&self) -> &str {
        match self {
            DeploymentStatus::Creating => "Creating",
            DeploymentStatus::InService => "InService",
            DeploymentStatus::Failed => "Failed",
            DeploymentStatus::Updating => "Updating",
            DeploymentStatus::Deleting => "Deleting",
            DeploymentStatus::Other(raw) => raw,
        }
    }
}

impl From<String> for DeploymentStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "Creating" => DeploymentStatus::Creating,
            "InService" => DeploymentStatus::InService,
            "Failed" => DeploymentStatus::Failed,
            "Updating" => DeploymentStatus::Updating,
            "Deleting" => DeploymentStatus::Deleting,
            _ => DeploymentStatus::Other(raw),
        }
    }
}

impl From<DeploymentStatus> for String {
    fn from(status: DeploymentStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A backend instance of the model, observed but never mutated by the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub name: String,
    pub status: DeploymentStatus,
    #[serde(deserialize_with = "deserialize_created_at")]
    pub created_at: DateTime<Utc>,
}

/// Creation time as RFC 3339 text or as epoch seconds
#[derive(Deserialize)]
#[serde(untagged)]
enum CreatedAt {
    Seconds(i64),
    FractionalSeconds(f64),
    Text(String),
}

fn deserialize_created_at<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let parsed = match CreatedAt::deserialize(deserializer)? {
        CreatedAt::Seconds(secs) => Utc.timestamp_opt(secs, 0).single(),
        CreatedAt::FractionalSeconds(secs) => {
            let whole = secs.floor();
            let nanos = ((secs - whole) * 1e9) as u32;
            Utc.timestamp_opt(whole as i64, nanos).single()
        }
        CreatedAt::Text(text) => {
            return DateTime::parse_from_rfc3339(&text)
                .map(|at| at.with_timezone(&Utc))
                .map_err(|e| de::Error::custom(format!("invalid createdAt '{}': {}", text, e)))
        }
    };

    parsed.ok_or_else(|| de::Error::custom("createdAt is outside the representable range"))
}

impl Deployment {
    pub fn new(name: impl Into<String>, status: DeploymentStatus, created_at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            status,
            created_at,
        }
    }
}

/// Raw backend reply, relayed to the caller untouched
#[derive(Debug, Clone)]
pub struct InvocationResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl InvocationResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Client side of the external model hosting service
#[async_trait]
pub trait HostingService: Send + Sync {
    /// All deployments whose name contains `name_contains`
    async fn list_deployments(&self, name_contains: &str) -> Result<Vec<Deployment>>;

    /// Send a payload to a deployment's inference interface. `content_type`
    /// is the caller's; JSON is assumed when it is absent.
    async fn invoke(
        &self,
        deployment: &str,
        payload: Bytes,
        content_type: Option<&str>,
    ) -> Result<InvocationResponse>;
}

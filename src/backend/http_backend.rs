//! HTTP client for the hosting service control and data planes

use async_trait::async_trait;
use axum::body::Bytes;
use reqwest::{header::CONTENT_TYPE, Client, Url};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::backend::traits::{Deployment, HostingService, InvocationResponse};
use crate::error::{AppError, Result};

/// Hosting service reached over HTTP
pub struct HttpHostingService {
    client: Client,
    base_url: Url,
}

const JSON_CONTENT_TYPE: &str = "application/json";

/// Listing response of the control plane. Entries are decoded one by one.
#[derive(Debug, Deserialize)]
struct ListDeploymentsResponse {
    #[serde(default)]
    deployments: Vec<Value>,
}

/// Decode listing entries, skipping any that do not describe a deployment
fn parse_listing(entries: Vec<Value>) -> Vec<Deployment> {
    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<Deployment>(entry.clone()) {
            Ok(deployment) => Some(deployment),
            Err(e) => {
                warn!(error = %e, entry = %entry, "Skipping malformed deployment entry");
                None
            }
        })
        .collect()
}

impl HttpHostingService {
    /// Create a client whose every call is bounded by `timeout`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        let base_url = Url::parse(base_url)
            .map_err(|e| AppError::Internal(format!("Invalid hosting URL '{}': {}", base_url, e)))?;

        Ok(Self { client, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::Internal(format!("Hosting URL {} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

fn map_transport_error(target: &str, e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        AppError::Timeout(format!("{} did not answer in time", target))
    } else if e.is_connect() {
        AppError::BackendUnavailable(format!("Connection failed to {}: {}", target, e))
    } else {
        AppError::BackendUnavailable(format!("Request to {} failed: {}", target, e))
    }
}

#[async_trait]
impl HostingService for HttpHostingService {
    async fn list_deployments(&self, name_contains: &str) -> Result<Vec<Deployment>> {
        let url = self.endpoint(&["deployments"])?;
        debug!(url = %url, name_contains = %name_contains, "Listing deployments");

        let response = self
            .client
            .get(url)
            .query(&[
                ("nameContains", name_contains),
                ("sortBy", "CreationTime"),
                ("sortOrder", "Descending"),
            ])
            .send()
            .await
            .map_err(|e| map_transport_error("hosting service", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::BackendUnavailable(format!(
                "Deployment listing returned {}: {}",
                status, body
            )));
        }

        let listing: ListDeploymentsResponse = response
            .json()
            .await
            .map_err(|e| AppError::BackendUnavailable(format!("Failed to parse deployment listing: {}", e)))?;
        Ok(parse_listing(listing.deployments))
    }

    async fn invoke(
        &self,
        deployment: &str,
        payload: Bytes,
        content_type: Option<&str>,
    ) -> Result<InvocationResponse> {
        let url = self.endpoint(&["deployments", deployment, "invocations"])?;
        debug!(url = %url, deployment = %deployment, "Invoking deployment");

        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, content_type.unwrap_or(JSON_CONTENT_TYPE))
            .body(payload.to_vec())
            .send()
            .await
            .map_err(|e| map_transport_error(deployment, e))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| map_transport_error(deployment, e))?;

        Ok(InvocationResponse {
            status,
            content_type,
            body: Bytes::from(body.to_vec()),
        })
    }
}

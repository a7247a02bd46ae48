//! Active backend discovery over the hosting service's deployment listing

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::backend::traits::{Deployment, HostingService};

/// Pick the newest InService deployment whose name contains `name_prefix`.
///
/// The listing is re-sorted by creation time (newest first) so the result
/// does not depend on the order the hosting service returned.
pub fn select_active<'a>(deployments: &'a [Deployment], name_prefix: &str) -> Option<&'a Deployment> {
    let mut candidates: Vec<&Deployment> = deployments
        .iter()
        .filter(|d| d.name.contains(name_prefix))
        .collect();
    candidates.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    candidates.into_iter().find(|d| d.status.is_in_service())
}

/// Resolves the deployment requests should currently be sent to
#[derive(Clone)]
pub struct BackendResolver {
    hosting: Arc<dyn HostingService>,
    name_prefix: String,
    timeout: Duration,
}

impl BackendResolver {
    pub fn new(hosting: Arc<dyn HostingService>, name_prefix: impl Into<String>, timeout: Duration) -> Self {
        Self {
            hosting,
            name_prefix: name_prefix.into(),
            timeout,
        }
    }

    pub fn name_prefix(&self) -> &str {
        &self.name_prefix
    }

    /// Query the hosting service and return the active deployment name.
    ///
    /// Not cached: each call sees the current listing. Every failure is
    /// logged and reported as `None`.
    pub async fn resolve_active_backend(&self) -> Option<String> {
        let listing = tokio::time::timeout(
            self.timeout,
            self.hosting.list_deployments(&self.name_prefix),
        )
        .await;

        let deployments = match listing {
            Ok(Ok(deployments)) => deployments,
            Ok(Err(e)) => {
                warn!(error = %e, "Error fetching deployments");
                return None;
            }
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "Deployment listing timed out");
                return None;
            }
        };

        debug!(count = deployments.len(), "Fetched deployments");

        match select_active(&deployments, &self.name_prefix) {
            Some(deployment) => {
                debug!(backend = %deployment.name, "Resolved active backend");
                Some(deployment.name.clone())
            }
            None => {
                info!(
                    prefix = %self.name_prefix,
                    listed = deployments.len(),
                    "No InService deployment found"
                );
                None
            }
        }
    }
}

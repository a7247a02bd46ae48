//! Request forwarding to the currently active deployment

use axum::body::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

use crate::backend::traits::{HostingService, InvocationResponse};
use crate::error::{AppError, Result};
use crate::gateway::discovery::BackendResolver;
use crate::gateway::traffic_log::{extract_records, TrafficLog};

/// Result of a successful relay
#[derive(Debug)]
pub struct ForwardOutcome {
    /// Deployment that served the request
    pub backend: String,
    /// Backend reply, unmodified
    pub response: InvocationResponse,
    /// Detached traffic-log write, present only for successful replies
    pub log_task: Option<JoinHandle<()>>,
}

/// Verbatim relay between callers and the active deployment
pub struct Gateway {
    resolver: BackendResolver,
    hosting: Arc<dyn HostingService>,
    traffic_log: Arc<TrafficLog>,
    invoke_timeout: Duration,
}

impl Gateway {
    pub fn new(
        resolver: BackendResolver,
        hosting: Arc<dyn HostingService>,
        traffic_log: Arc<TrafficLog>,
        invoke_timeout: Duration,
    ) -> Self {
        Self {
            resolver,
            hosting,
            traffic_log,
            invoke_timeout,
        }
    }

    pub fn resolver(&self) -> &BackendResolver {
        &self.resolver
    }

    pub fn traffic_log(&self) -> &Arc<TrafficLog> {
        &self.traffic_log
    }

    /// Resolve the active backend, relay `payload` with the caller's content
    /// type and schedule traffic logging.
    ///
    /// Backend replies are returned as-is whatever their status; only a
    /// missing backend, a transport failure or a timeout become errors.
    pub async fn forward(&self, payload: Bytes, content_type: Option<&str>) -> Result<ForwardOutcome> {
        let request_id = Uuid::new_v4();
        self.relay(payload, content_type)
            .instrument(tracing::info_span!("forward", %request_id))
            .await
    }

    async fn relay(&self, payload: Bytes, content_type: Option<&str>) -> Result<ForwardOutcome> {
        let backend = self
            .resolver
            .resolve_active_backend()
            .await
            .ok_or(AppError::NoActiveBackend)?;

        info!(backend = %backend, "Routing request");

        let response = tokio::time::timeout(
            self.invoke_timeout,
            self.hosting.invoke(&backend, payload.clone(), content_type),
        )
        .await
        .map_err(|_| {
            AppError::Timeout(format!(
                "backend {} did not answer within {} ms",
                backend,
                self.invoke_timeout.as_millis()
            ))
        })??;

        let log_task = if response.is_success() {
            Some(self.spawn_traffic_log(payload, response.body.clone()))
        } else {
            warn!(backend = %backend, status = response.status, "Backend returned an error");
            None
        };

        Ok(ForwardOutcome {
            backend,
            response,
            log_task,
        })
    }

    fn spawn_traffic_log(&self, request: Bytes, response: Bytes) -> JoinHandle<()> {
        let traffic_log = self.traffic_log.clone();

        tokio::spawn(
            async move {
                let records = extract_records(&request, &response);
                match traffic_log.append(&records).await {
                    Ok(0) => {}
                    Ok(count) => info!(
                        records = count,
                        path = %traffic_log.path().display(),
                        "Logged predictions"
                    ),
                    Err(e) => error!(error = %e, "Logging Error"),
                }
            }
            .in_current_span(),
        )
    }
}

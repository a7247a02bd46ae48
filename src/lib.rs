//! Sentiment Serving Gateway
//!
//! A prediction server that classifies text with a locally loaded artifact
//! bundle, and a router that relays requests to the newest healthy
//! deployment of that server while logging traffic for drift monitoring.

pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod middleware;
pub mod predictor;

pub use error::{AppError, Result};

use std::sync::Arc;

use backend::{HostingService, HttpHostingService};
use gateway::{BackendResolver, Gateway, TrafficLog};
use predictor::PredictionService;

/// State shared by the prediction server's handlers
pub struct PredictionAppState {
    pub settings: config::Settings,
    pub predictor: Arc<PredictionService>,
}

impl PredictionAppState {
    /// Load artifacts once; a failed load still yields a serving state
    pub fn load(settings: config::Settings) -> Self {
        let predictor = Arc::new(PredictionService::load(&settings.predictor));
        Self {
            settings,
            predictor,
        }
    }
}

/// State shared by the router's handlers
pub struct RouterAppState {
    pub settings: config::Settings,
    pub gateway: Arc<Gateway>,
}

impl RouterAppState {
    /// Wire the gateway to the configured HTTP hosting service
    pub fn from_settings(settings: config::Settings) -> Result<Self> {
        let hosting: Arc<dyn HostingService> = Arc::new(HttpHostingService::new(
            &settings.discovery.hosting_url,
            settings.router.invoke_timeout(),
        )?);
        Ok(Self::with_hosting(settings, hosting))
    }

    /// Wire the gateway to any hosting service implementation
    pub fn with_hosting(settings: config::Settings, hosting: Arc<dyn HostingService>) -> Self {
        let resolver = BackendResolver::new(
            hosting.clone(),
            settings.discovery.name_prefix.clone(),
            settings.discovery.timeout(),
        );
        let traffic_log = Arc::new(TrafficLog::new(settings.router.traffic_log_path.clone()));
        let gateway = Arc::new(Gateway::new(
            resolver,
            hosting,
            traffic_log,
            settings.router.invoke_timeout(),
        ));

        Self { settings, gateway }
    }
}

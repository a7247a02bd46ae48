//! Configuration module

pub mod settings;

pub use settings::{
    DiscoveryConfig, LoggingConfig, PredictorConfig, RateLimitConfig, RouterConfig, ServerConfig,
    Settings,
};

//! Backend module - Hosting service interface and HTTP client

pub mod http_backend;
pub mod traits;

pub use http_backend::HttpHostingService;
pub use traits::{Deployment, DeploymentStatus, HostingService, InvocationResponse};

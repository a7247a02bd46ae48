//! Gateway module - Backend discovery, forwarding and traffic logging

pub mod discovery;
pub mod router;
pub mod traffic_log;

pub use discovery::BackendResolver;
pub use router::{ForwardOutcome, Gateway};
pub use traffic_log::{TrafficLog, TrafficRecord};

//! Middleware module - Rate limiting

pub mod rate_limit;

pub use rate_limit::RateLimitLayer;

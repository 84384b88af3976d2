//! Leave-policy gateway library.
//!
//! Serves employee leave data from a warehouse behind a circuit breaker,
//! falling back to a static dataset whenever the warehouse is unavailable.

pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod warehouse;

pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use resilience::{CircuitBreaker, CircuitBreakerRegistry};
pub use warehouse::WarehouseClient;

//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Warehouse call:
//!     → registry.rs (breaker looked up / created per dependency)
//!     → circuit_breaker.rs (admit, reject, or probe; record outcome)
//!     → clock.rs (monotonic time for the open → half-open cooldown)
//! ```
//!
//! # Design Decisions
//! - The breaker is a pure health gate; fallback policy lives in the caller
//! - No global state: the registry is constructed once and injected
//! - Time is injectable so cooldowns can be simulated in tests

pub mod circuit_breaker;
pub mod clock;
pub mod registry;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerStats,
    CircuitOpenError, CircuitState,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use registry::CircuitBreakerRegistry;

//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional, named by GATEWAY_CONFIG)
//!     → loader.rs (parse, overlay environment variables)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → mode.rs (pure mock/real decision for the warehouse client)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Missing warehouse credentials are not an error; they select mock mode

pub mod loader;
pub mod mode;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_from_env, ConfigError, IgnoredOverride};
pub use mode::{resolve_mode, ConnectionParams, MockReason, ModeDecision};
pub use schema::{AdminConfig, GatewayConfig, ListenerConfig, ObservabilityConfig, WarehouseSettings};

//! Employee data access.
//!
//! # Data Flow
//! ```text
//! HTTP handler
//!     → client.rs (mode check, breaker, mock fallback)
//!     → backend.rs (session + bound statement over the SQL API)
//!     ↘ mock.rs (static table, on mock mode or any failure)
//! ```

pub mod backend;
pub mod client;
pub mod error;
pub mod mock;
pub mod types;

pub use backend::{SqlApiConnector, WarehouseConnection, WarehouseConnector};
pub use client::{WarehouseClient, WarehouseClientStats, WarehouseMode, BREAKER_NAME};
pub use error::{WarehouseError, WarehouseResult};
pub use types::{EmployeeFilter, EmployeeRecord};

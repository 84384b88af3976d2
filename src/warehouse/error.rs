//! Warehouse error definitions.

use thiserror::Error;

/// Errors raised by the real warehouse backend.
///
/// None of these reach callers of `WarehouseClient`; they are recorded by the
/// circuit breaker and answered with mock data.
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// Session could not be established.
    #[error("Connection failed: {0}")]
    Connect(String),

    /// Transport-level failure (DNS, refused, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The SQL API answered with a non-success status.
    #[error("Warehouse returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response did not have the expected shape.
    #[error("Decode error: {0}")]
    Decode(String),
}

impl WarehouseError {
    /// Whether the cached session can no longer be trusted after this error.
    ///
    /// Rejected credentials and transport failures mean the next call must
    /// log in again. Server errors and bad payloads leave the session usable.
    pub fn invalidates_session(&self) -> bool {
        match self {
            WarehouseError::Connect(_) | WarehouseError::Http(_) => true,
            WarehouseError::Status { status, .. } => matches!(status, 401 | 403),
            WarehouseError::Decode(_) => false,
        }
    }
}

pub type WarehouseResult<T> = Result<T, WarehouseError>;

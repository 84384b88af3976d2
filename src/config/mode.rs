//! Mock-versus-real decision for the warehouse client.
//!
//! A pure function of the settings, so it can be tested without touching the
//! process environment.

use std::fmt;
use std::time::Duration;
use url::Url;

use crate::config::schema::WarehouseSettings;

/// Why the client is serving mock data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReason {
    /// Mock mode was asked for explicitly.
    Requested,
    /// Required connection settings are absent.
    MissingSettings(Vec<&'static str>),
    /// The configured or derived endpoint is not a valid URL.
    InvalidEndpoint(String),
    /// Real mode was resolved but no backend connector was supplied.
    NoConnector,
}

impl fmt::Display for MockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MockReason::Requested => write!(f, "mock mode requested"),
            MockReason::MissingSettings(names) => {
                write!(f, "missing warehouse settings: {}", names.join(", "))
            }
            MockReason::InvalidEndpoint(endpoint) => {
                write!(f, "invalid warehouse endpoint '{}'", endpoint)
            }
            MockReason::NoConnector => write!(f, "no warehouse connector available"),
        }
    }
}

/// Everything needed to open a warehouse session.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub account: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub schema: String,
    pub warehouse: String,
    /// Base URL of the SQL API, always ending in `/`.
    pub endpoint: Url,
    pub request_timeout: Duration,
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("account", &self.account)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("warehouse", &self.warehouse)
            .field("endpoint", &self.endpoint.as_str())
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Result of resolving the warehouse mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeDecision {
    Mock(MockReason),
    Real(ConnectionParams),
}

impl ModeDecision {
    pub fn is_mock(&self) -> bool {
        matches!(self, ModeDecision::Mock(_))
    }
}

/// Decide between mock and real mode.
///
/// An explicit `use_mock = true` wins. Otherwise all six connection settings
/// must be present and the endpoint must parse; anything short of that
/// resolves to mock mode with the reason attached.
pub fn resolve_mode(settings: &WarehouseSettings) -> ModeDecision {
    if settings.use_mock == Some(true) {
        return ModeDecision::Mock(MockReason::Requested);
    }

    let fields: [(&'static str, &Option<String>); 6] = [
        ("account", &settings.account),
        ("user", &settings.user),
        ("password", &settings.password),
        ("database", &settings.database),
        ("schema", &settings.schema),
        ("warehouse", &settings.warehouse),
    ];
    let missing: Vec<&'static str> = fields
        .iter()
        .filter(|(_, value)| value.as_deref().map_or(true, |v| v.trim().is_empty()))
        .map(|(name, _)| *name)
        .collect();
    if !missing.is_empty() {
        return ModeDecision::Mock(MockReason::MissingSettings(missing));
    }

    let value = |v: &Option<String>| v.as_deref().unwrap_or_default().trim().to_string();
    let account = value(&settings.account);

    let endpoint_raw = settings
        .endpoint
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("https://{}.snowflakecomputing.com", account));
    let mut endpoint = match Url::parse(&endpoint_raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => url,
        _ => return ModeDecision::Mock(MockReason::InvalidEndpoint(endpoint_raw)),
    };
    // API paths are joined onto the endpoint, which replaces the last
    // segment unless the path ends in a slash.
    if !endpoint.path().ends_with('/') {
        let path = format!("{}/", endpoint.path());
        endpoint.set_path(&path);
    }

    ModeDecision::Real(ConnectionParams {
        account,
        user: value(&settings.user),
        password: value(&settings.password),
        database: value(&settings.database),
        schema: value(&settings.schema),
        warehouse: value(&settings.warehouse),
        endpoint,
        request_timeout: Duration::from_secs(settings.request_timeout_secs),
    })
}

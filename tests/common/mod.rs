//! Shared utilities for integration tests.

#![allow(dead_code)]

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use leave_gateway::config::{GatewayConfig, WarehouseSettings};
use leave_gateway::lifecycle::{build_state, Shutdown};
use leave_gateway::HttpServer;

/// Counters and failure switch for a running mock warehouse.
#[derive(Default)]
pub struct WarehouseControl {
    pub failing: AtomicBool,
    /// Bumped to revoke every session token issued so far.
    pub token_epoch: AtomicUsize,
    pub logins: AtomicUsize,
    pub statements: AtomicUsize,
    pub logouts: AtomicUsize,
}

impl WarehouseControl {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn statements(&self) -> usize {
        self.statements.load(Ordering::SeqCst)
    }

    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    /// Revoke all issued tokens, as the warehouse does when sessions expire.
    pub fn expire_sessions(&self) {
        self.token_epoch.fetch_add(1, Ordering::SeqCst);
    }

    fn token(&self) -> String {
        format!("session-{}", self.token_epoch.load(Ordering::SeqCst))
    }
}

/// Rows served by the mock warehouse. EMP001 differs from the built-in
/// dataset so tests can tell live answers from fallback answers.
fn rows() -> Vec<[&'static str; 7]> {
    vec![
        [
            "EMP001",
            "John Doe",
            "US",
            "Engineering",
            "2023-01-15",
            "14",
            r#"{"PTO": 9, "Sick Leave": 10, "Parental Leave": 0}"#,
        ],
        [
            "EMP004",
            "Priya Raman",
            "India",
            "Engineering",
            "2021-08-02",
            "41",
            r#"{"Privilege Leave": 18, "Casual Leave": 6}"#,
        ],
    ]
}

fn row_type() -> Value {
    json!([
        {"name": "EMPLOYEE_ID"},
        {"name": "NAME"},
        {"name": "COUNTRY"},
        {"name": "DEPARTMENT"},
        {"name": "JOIN_DATE"},
        {"name": "TENURE_MONTHS"},
        {"name": "LEAVE_BALANCE"}
    ])
}

fn unavailable() -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, "warehouse unavailable").into_response()
}

fn authorized(ctl: &WarehouseControl, headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {}", ctl.token()))
}

async fn login(State(ctl): State<Arc<WarehouseControl>>, Json(body): Json<Value>) -> Response {
    ctl.logins.fetch_add(1, Ordering::SeqCst);
    if ctl.failing.load(Ordering::SeqCst) {
        return unavailable();
    }
    if body["password"].as_str().unwrap_or_default().is_empty() {
        return (StatusCode::UNAUTHORIZED, "bad credentials").into_response();
    }
    Json(json!({ "token": ctl.token() })).into_response()
}

async fn logout(State(ctl): State<Arc<WarehouseControl>>, headers: HeaderMap) -> Response {
    if !authorized(&ctl, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    ctl.logouts.fetch_add(1, Ordering::SeqCst);
    StatusCode::OK.into_response()
}

async fn statement(
    State(ctl): State<Arc<WarehouseControl>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    ctl.statements.fetch_add(1, Ordering::SeqCst);
    // A revoked token is rejected even while the warehouse is failing.
    if !authorized(&ctl, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if ctl.failing.load(Ordering::SeqCst) {
        return unavailable();
    }

    let sql = body["statement"].as_str().unwrap_or_default();
    let binding = |n: usize| body["bindings"][n.to_string()]["value"].as_str().map(str::to_string);

    if sql == "SELECT 1" {
        return Json(json!({
            "resultSetMetaData": {"rowType": [{"name": "1"}]},
            "data": [["1"]]
        }))
        .into_response();
    }

    let mut next = 1;
    let mut bound = |column_present: bool| {
        if column_present {
            let value = binding(next);
            next += 1;
            value
        } else {
            None
        }
    };
    let id = bound(sql.contains("employee_id = ?"));
    let country = bound(sql.contains("country = ?"));
    let department = bound(sql.contains("department = ?"));

    let data: Vec<Vec<&str>> = rows()
        .into_iter()
        .filter(|r| id.as_deref().map_or(true, |v| v == r[0]))
        .filter(|r| country.as_deref().map_or(true, |v| v == r[2]))
        .filter(|r| department.as_deref().map_or(true, |v| v == r[3]))
        .map(|r| r.to_vec())
        .collect();

    Json(json!({
        "resultSetMetaData": {"rowType": row_type()},
        "data": data
    }))
    .into_response()
}

/// Start a mock warehouse SQL API on an ephemeral port.
pub async fn start_mock_warehouse() -> (SocketAddr, Arc<WarehouseControl>) {
    start_mock_warehouse_under("").await
}

/// Start a mock warehouse whose API lives below `prefix`, e.g. `/snowflake`.
pub async fn start_mock_warehouse_under(prefix: &str) -> (SocketAddr, Arc<WarehouseControl>) {
    let ctl = Arc::new(WarehouseControl::default());
    let api = Router::new()
        .route("/api/v2/sessions", post(login).delete(logout))
        .route("/api/v2/statements", post(statement))
        .with_state(ctl.clone());
    let app = if prefix.is_empty() {
        api
    } else {
        Router::new().nest(prefix, api)
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (addr, ctl)
}

/// Full credentials pointing at `addr`.
pub fn warehouse_settings(addr: SocketAddr) -> WarehouseSettings {
    warehouse_settings_at(format!("http://{}", addr))
}

/// Full credentials pointing at an explicit endpoint URL.
pub fn warehouse_settings_at(endpoint: String) -> WarehouseSettings {
    WarehouseSettings {
        use_mock: Some(false),
        account: Some("test-account".into()),
        user: Some("svc".into()),
        password: Some("secret".into()),
        database: Some("HR".into()),
        schema: Some("PUBLIC".into()),
        warehouse: Some("COMPUTE_WH".into()),
        endpoint: Some(endpoint),
        request_timeout_secs: 2,
    }
}

/// A running gateway plus the handle that stops it.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start the gateway on an ephemeral port.
pub async fn start_gateway(config: GatewayConfig) -> TestGateway {
    let state = build_state(&config, None);
    let server = HttpServer::new(state, &config.listener);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestGateway { addr, shutdown }
}

/// HTTP client that never pools or proxies, so each test sees fresh connections.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with all handlers
//! - Wire up middleware (tracing, timeout, request ID, metrics)
//! - Serve on a bound listener until shutdown is signalled

use axum::{http::HeaderName, middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin;
use crate::config::{AdminConfig, ListenerConfig};
use crate::http::handlers;
use crate::http::middleware::track_metrics;
use crate::resilience::CircuitBreakerRegistry;
use crate::warehouse::WarehouseClient;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub client: Arc<WarehouseClient>,
    pub registry: Arc<CircuitBreakerRegistry>,
    /// `None` when metrics are disabled.
    pub metrics: Option<PrometheusHandle>,
    pub admin: AdminConfig,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(state: AppState, listener: &ListenerConfig) -> Self {
        let router = Self::build_router(state, Duration::from_secs(listener.request_timeout_secs));
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState, request_timeout: Duration) -> Router {
        let request_id = HeaderName::from_static(X_REQUEST_ID);

        Router::new()
            .route("/", get(handlers::root))
            .route("/health", get(handlers::health))
            .route("/stats", get(handlers::stats))
            .route("/metrics", get(handlers::metrics))
            .route("/employees", get(handlers::list_employees))
            .route("/employees/{id}", get(handlers::get_employee))
            .merge(admin::setup_admin_router(state.clone()))
            .with_state(state)
            .layer(middleware::from_fn(track_metrics))
            .layer(TimeoutLayer::new(request_timeout))
            .layer(PropagateRequestIdLayer::new(request_id.clone()))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
    }

    /// The configured router, for serving or driving in-process.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until a shutdown signal arrives on `shutdown`.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server received shutdown signal");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MockReason;
    use crate::resilience::CircuitBreakerConfig;
    use crate::warehouse::BREAKER_NAME;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn server(api_key: Option<&str>) -> HttpServer {
        let registry = Arc::new(CircuitBreakerRegistry::new());
        let breaker = registry.get_or_create(BREAKER_NAME, CircuitBreakerConfig::default());
        let client = Arc::new(WarehouseClient::mock(MockReason::Requested, breaker));
        let state = AppState {
            client,
            registry,
            metrics: None,
            admin: AdminConfig {
                api_key: api_key.map(str::to_string),
            },
        };
        HttpServer::new(state, &ListenerConfig::default())
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_employee_found() {
        let response = server(None).router().oneshot(get("/employees/EMP001")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(X_REQUEST_ID));
        let body = body_json(response).await;
        assert_eq!(body["name"], "John Doe");
        assert_eq!(body["leave_balance"]["PTO"], 15);
    }

    #[tokio::test]
    async fn test_unknown_employee_is_json_404() {
        let response = server(None).router().oneshot(get("/employees/EMP999")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["status_code"], 404);
        assert_eq!(body["error"], "Employee EMP999 not found");
    }

    #[tokio::test]
    async fn test_employee_list_filters() {
        let response = server(None)
            .router()
            .oneshot(get("/employees?country=India"))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["employees"][0]["employee_id"], "EMP002");
    }

    #[tokio::test]
    async fn test_health_in_mock_mode() {
        let response = server(None).router().oneshot(get("/health")).await.unwrap();
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["components"]["warehouse"]["details"]["mode"], "mock");
        assert_eq!(body["components"]["circuit_breakers"][0]["name"], BREAKER_NAME);
    }

    #[tokio::test]
    async fn test_metrics_disabled_is_404() {
        let response = server(None).router().oneshot(get("/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_admin_reset_requires_key() {
        let router = server(Some("secret")).router();
        let reset = |auth: Option<&str>| {
            let mut builder = Request::builder()
                .method("POST")
                .uri(format!("/admin/breakers/{}/reset", BREAKER_NAME));
            if let Some(auth) = auth {
                builder = builder.header("Authorization", auth);
            }
            builder.body(Body::empty()).unwrap()
        };

        let denied = router.clone().oneshot(reset(None)).await.unwrap();
        assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

        let wrong = router.clone().oneshot(reset(Some("Bearer nope"))).await.unwrap();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

        let ok = router.oneshot(reset(Some("Bearer secret"))).await.unwrap();
        assert_eq!(ok.status(), StatusCode::OK);
        assert_eq!(body_json(ok).await["state"], "closed");
    }

    #[tokio::test]
    async fn test_reset_unknown_breaker() {
        let response = server(None)
            .router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/admin/breakers/nope/reset")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

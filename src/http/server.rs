//! HTTP server implementation.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::Uri;
use axum::routing::{any, get};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::{error, info};

use super::middleware::rate_limit;
use crate::error::{Result, TollgateError};
use crate::ratelimit::RateLimiter;

/// Build the service router.
///
/// `/healthz` bypasses rate limiting; everything under `/api/` is counted.
pub fn router(rate_limiter: Arc<RateLimiter>) -> Router {
    let api = Router::new()
        .route("/api/{*path}", any(echo))
        .layer(axum::middleware::from_fn_with_state(rate_limiter, rate_limit));

    Router::new().route("/healthz", get(health)).merge(api)
}

async fn health() -> &'static str {
    "ok"
}

async fn echo(uri: Uri) -> Json<Value> {
    Json(json!({ "path": uri.path(), "ok": true }))
}

/// HTTP server guarded by the rate limiter.
pub struct HttpServer {
    /// Address to bind to
    addr: SocketAddr,
    /// The rate limiter instance
    rate_limiter: Arc<RateLimiter>,
}

impl HttpServer {
    /// Create a new server.
    pub fn new(addr: SocketAddr, rate_limiter: Arc<RateLimiter>) -> Self {
        Self { addr, rate_limiter }
    }

    /// Start the server with graceful shutdown.
    ///
    /// The server will shut down when the provided signal resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.addr).await?;
        info!(addr = %listener.local_addr()?, "Starting HTTP server");

        axum::serve(listener, router(self.rate_limiter))
            .with_graceful_shutdown(signal)
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP server failed");
                TollgateError::Io(e)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[test]
    fn test_server_creation() {
        let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let _server = HttpServer::new(addr, Arc::new(RateLimiter::default()));
    }

    #[tokio::test]
    async fn test_health_is_not_limited() {
        let limiter = Arc::new(RateLimiter::default());
        let app = router(limiter.clone());

        let response = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("x-ratelimit-limit").is_none());
        assert_eq!(limiter.counter_count(), 0);
    }

    #[tokio::test]
    async fn test_api_route_is_limited() {
        let limiter = Arc::new(RateLimiter::default());
        let app = router(limiter.clone());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/clients")
                    .header("x-real-ip", "192.0.2.44")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-ratelimit-limit"], "100");
        assert_eq!(response.headers()["x-ratelimit-remaining"], "99");
        assert!(limiter.counter("/api/clients", "192.0.2.44").is_some());
    }
}

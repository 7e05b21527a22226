use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::cors::CorsLayer;

use super::api::{self, AppState};
use super::db::{DbHandle, RegistryDb};
use super::delivery::{DEFAULT_ATTEMPT_TIMEOUT, DEFAULT_MAX_ATTEMPTS, DeliveryEngine};
use super::notifier::CompletionNotifier;
use super::registry::JobRegistry;
use super::verifier::{InboundVerifier, RelayHandler};

/// Configuration for the relay server.
pub struct ServerConfig {
    pub port: u16,
    pub db_path: std::path::PathBuf,
    pub dev_mode: bool,
    /// Reject terminal events for jobs that have no signing secret on file.
    pub require_signature: bool,
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3141,
            db_path: std::path::PathBuf::from(".courier/jobs.db"),
            dev_mode: false,
            require_signature: false,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }
}

/// Build the full application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    api::api_router().with_state(state)
}

/// Start the relay server.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    // Ensure parent directory exists for DB
    if let Some(parent) = config.db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }
    }

    let db = RegistryDb::new(&config.db_path).context("Failed to initialize job registry")?;
    let registry = JobRegistry::new(DbHandle::new(db));
    let delivery = DeliveryEngine::new(config.attempt_timeout)
        .context("Failed to build delivery engine")?
        .with_max_attempts(config.max_attempts);
    let notifier = CompletionNotifier::new(registry.clone(), delivery);

    let state = Arc::new(AppState {
        registry: registry.clone(),
        verifier: InboundVerifier::new(registry, config.require_signature),
        handler: Arc::new(RelayHandler::new(notifier)),
    });

    let mut app = build_router(state);

    if config.dev_mode {
        app = app.layer(CorsLayer::permissive());
    }

    let host = if config.dev_mode { "0.0.0.0" } else { "127.0.0.1" };
    let addr = format!("{}:{}", host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    println!("Courier relay running at http://{}", local_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    println!("Server shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    println!("\nShutting down...");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn test_router() -> Router {
        let db = RegistryDb::new_in_memory().unwrap();
        let registry = JobRegistry::new(DbHandle::new(db));
        let delivery = DeliveryEngine::new(Duration::from_millis(200))
            .unwrap()
            .with_max_attempts(1);
        let notifier = CompletionNotifier::new(registry.clone(), delivery);
        let state = Arc::new(AppState {
            registry: registry.clone(),
            verifier: InboundVerifier::new(registry, false),
            handler: Arc::new(RelayHandler::new(notifier)),
        });
        build_router(state)
    }

    #[tokio::test]
    async fn test_health_via_full_router() {
        let app = test_router();
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_register_route_mounted() {
        let app = test_router();
        let req = Request::builder()
            .method("POST")
            .uri("/api/jobs")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::json!({"jobId": "bc-1", "callbackUrl": "https://example.com/hook"})
                    .to_string(),
            ))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_webhook_route_mounted() {
        let app = test_router();
        // A malformed body proves the request reached the verifier, not the
        // router's own 404.
        let req = Request::builder()
            .method("POST")
            .uri("/webhooks/agent/bc-1")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 3141);
        assert_eq!(config.db_path, std::path::PathBuf::from(".courier/jobs.db"));
        assert!(!config.dev_mode);
        assert!(!config.require_signature);
        assert_eq!(config.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(config.attempt_timeout, DEFAULT_ATTEMPT_TIMEOUT);
    }
}

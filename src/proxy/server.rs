use crate::proxy::config::{ProxyConfig, SecurityConfig};
use crate::proxy::upstream::Transport;
use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::Request,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, Span};

/// Token request bodies are tiny JSON objects
const TOKEN_BODY_LIMIT: usize = 16 * 1024;

/// Axum application state. Read-only for the life of the process.
#[derive(Clone)]
pub struct AppState {
    pub security: Arc<SecurityConfig>,
    pub upstream: Arc<dyn Transport>,
}

impl AppState {
    pub fn new(security: SecurityConfig, upstream: Arc<dyn Transport>) -> Self {
        Self {
            security: Arc::new(security),
            upstream,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    use crate::proxy::handlers;

    Router::new()
        .route(
            "/api/proxy",
            get(handlers::proxy::handle_proxy).options(handlers::proxy::handle_proxy),
        )
        .route(
            "/api/token",
            axum::routing::post(handlers::token::handle_token)
                .options(handlers::token::handle_token)
                .layer(DefaultBodyLimit::max(TOKEN_BODY_LIMIT)),
        )
        .route("/healthz", get(health_check_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::proxy::middleware::panic_recovery_middleware,
        ))
        .layer(axum::middleware::from_fn(
            crate::proxy::middleware::request_log_middleware,
        ))
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .with_state(state)
}

/// Per-request span. Path only: the query carries caller-chosen target URLs.
fn request_span(request: &Request<Body>) -> Span {
    tracing::debug_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
    )
}

/// Axum server instance
pub struct AxumServer {
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl AxumServer {
    /// Start Axum server
    pub async fn start(
        config: &ProxyConfig,
        state: AppState,
    ) -> Result<(Self, tokio::task::JoinHandle<()>), String> {
        let app = build_router(state);

        // Bind address
        let addr = format!("{}:{}", config.get_bind_address(), config.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| format!("Failed to bind address {}: {}", addr, e))?;

        tracing::info!("Gateway started at http://{}", addr);

        // Create shutdown channel
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let server_instance = Self {
            shutdown_tx: Some(shutdown_tx),
        };

        // Start server in new task
        let handle = tokio::spawn(async move {
            use hyper::server::conn::http1;
            use hyper_util::rt::TokioIo;
            use hyper_util::service::TowerToHyperService;

            loop {
                tokio::select! {
                    res = listener.accept() => {
                        match res {
                            Ok((stream, _)) => {
                                let io = TokioIo::new(stream);
                                let service = TowerToHyperService::new(app.clone());

                                // Dropping the connection drops the in-flight handler,
                                // which abandons its outbound call
                                tokio::task::spawn(async move {
                                    if let Err(err) = http1::Builder::new()
                                        .serve_connection(io, service)
                                        .await
                                    {
                                        debug!("Connection handling finished or errored: {:?}", err);
                                    }
                                });
                            }
                            Err(e) => {
                                error!("Failed to accept connection: {:?}", e);
                            }
                        }
                    }
                    _ = &mut shutdown_rx => {
                        tracing::info!("Gateway stopped listening");
                        break;
                    }
                }
            }
        });

        Ok((server_instance, handle))
    }

    /// Stop server
    pub fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Health check handler
async fn health_check_handler() -> Response {
    Json(serde_json::json!({
        "status": "ok"
    }))
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockReply, MockTransport};
    use axum::body::to_bytes;
    use axum::http::StatusCode;
    use std::io;
    use std::sync::Mutex;
    use tower::ServiceExt;

    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn app() -> Router {
        let transport = Arc::new(MockTransport::replying(MockReply::json(200, "{}")));
        build_router(AppState::new(SecurityConfig::default(), transport))
    }

    #[tokio::test]
    async fn test_health_check() {
        let response = app()
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], br#"{"status":"ok"}"#);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let response = app()
            .oneshot(Request::get("/api/other").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_token_body_limit() {
        let body = format!(r#"{{"secret":"{}"}}"#, "a".repeat(TOKEN_BODY_LIMIT * 2));
        let response = app()
            .oneshot(
                Request::post("/api/token")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn test_request_span_omits_query() {
        let captured = CapturedLog::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let request = Request::get("/api/proxy?url=https%3A%2F%2Fcdn.example%2Fprivate.png")
            .body(Body::empty())
            .unwrap();
        tracing::subscriber::with_default(subscriber, || {
            let span = request_span(&request);
            let _entered = span.enter();
            tracing::debug!("inside request span");
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("inside request span"));
        assert!(output.contains("path=/api/proxy"));
        assert!(!output.contains("cdn.example"));
        assert!(!output.contains("url="));
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let config = ProxyConfig {
            port: 0,
            ..ProxyConfig::default()
        };
        let transport = Arc::new(MockTransport::replying(MockReply::json(200, "{}")));
        let (server, handle) = AxumServer::start(&config, AppState::new(SecurityConfig::default(), transport))
            .await
            .unwrap();
        server.stop();
        handle.await.unwrap();
    }
}

// Panic recovery
// A panicking handler still answers in its route's error format, with CORS
// headers, so the browser can read the failure.

use std::panic::AssertUnwindSafe;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use futures::FutureExt;
use tracing::error;

use crate::error::GatewayError;
use crate::proxy::common::cors::{CorsPolicy, Endpoint};
use crate::proxy::mappers::{json_error, plain_error};
use crate::proxy::policy::origin_header;
use crate::proxy::server::AppState;

const TOKEN_PATH: &str = "/api/token";

pub async fn panic_recovery_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let origin = origin_header(request.headers()).map(str::to_string);

    match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => response,
        Err(_) => {
            error!("Handler panicked while serving {}", path);
            let origins = &state.security.allowed_origins;
            let origin = origin.as_deref();

            if path == TOKEN_PATH {
                let reason = GatewayError::TokenExchange("Token exchange failed: internal error".to_string());
                let cors = CorsPolicy::new(origins, Endpoint::Token);
                json_error(&reason, &reason.to_string(), &cors, origin)
            } else {
                let reason = GatewayError::Fetch("internal error".to_string());
                let cors = CorsPolicy::new(origins, Endpoint::Proxy);
                plain_error(&reason, &cors, origin)
            }
        }
    }
}

// Token exchange handler
// POST|OPTIONS /api/token  {"secret": "<string>"}

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method},
    response::Response,
};
use tracing::{error, info, warn};

use crate::proxy::common::cors::{CorsPolicy, Endpoint};
use crate::proxy::mappers::{json_error, json_relay};
use crate::proxy::policy::{classify, origin_header, Admission, RequestFacts};
use crate::proxy::server::AppState;
use crate::proxy::token_exchange::{exchange_secret, parse_secret, redact};

pub async fn handle_token(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let security = &state.security;
    let origin = origin_header(&headers);
    let cors = CorsPolicy::new(&security.allowed_origins, Endpoint::Token);

    let secret = parse_secret(&body);
    let input = secret.as_ref().map(|_| ()).map_err(Clone::clone);
    let facts = RequestFacts::new(&method, &headers, &security.allowed_origins, input);

    match classify(facts) {
        Admission::Preflight => return cors.preflight(origin),
        Admission::Deny(reason) => {
            warn!("Token request denied: {}", reason);
            return json_error(&reason, &reason.to_string(), &cors, origin);
        }
        Admission::Allow(_) => {}
    }

    let secret = match secret {
        Ok(secret) => secret,
        Err(reason) => return json_error(&reason, &reason.to_string(), &cors, origin),
    };

    match exchange_secret(state.upstream.as_ref(), security, &secret).await {
        Ok((status, data)) => {
            info!("Token exchange completed with status {}", status);
            json_relay(status, data, &cors, origin)
        }
        Err(reason) => {
            let message = redact(&reason.to_string(), &secret);
            error!("Token exchange failed: {}", message);
            json_error(&reason, &message, &cors, origin)
        }
    }
}

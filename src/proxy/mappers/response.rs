// Client-facing response construction

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

use crate::error::GatewayError;
use crate::proxy::common::cors::CorsPolicy;
use crate::proxy::upstream::UpstreamResponse;

// Connection-level headers; the gateway re-frames the body
const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "transfer-encoding",
    "te",
    "trailer",
    "upgrade",
];

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(HeaderName::from_static(name));
    }
}

/// Relay an upstream response: status and body stream untouched, upstream
/// headers kept, CORS headers overwritten.
pub fn relay_upstream(upstream: UpstreamResponse, cors: &CorsPolicy<'_>, origin: Option<&str>) -> Response {
    let UpstreamResponse {
        status,
        mut headers,
        body,
        ..
    } = upstream;

    strip_hop_by_hop(&mut headers);
    cors.apply(&mut headers, origin);

    let mut response = Response::new(Body::from_stream(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// text/plain error for the resource proxy
pub fn plain_error(error: &GatewayError, cors: &CorsPolicy<'_>, origin: Option<&str>) -> Response {
    let mut response = (error.status(), error.to_string()).into_response();
    cors.apply(response.headers_mut(), origin);
    response
}

/// `{"error": message}` for the token exchange
pub fn json_error(error: &GatewayError, message: &str, cors: &CorsPolicy<'_>, origin: Option<&str>) -> Response {
    let mut response = (error.status(), Json(json!({ "error": message }))).into_response();
    cors.apply(response.headers_mut(), origin);
    response
}

/// JSON success body with the upstream status
pub fn json_relay(
    status: axum::http::StatusCode,
    data: serde_json::Value,
    cors: &CorsPolicy<'_>,
    origin: Option<&str>,
) -> Response {
    let mut response = (status, Json(data)).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    cors.apply(headers, origin);
    response
}

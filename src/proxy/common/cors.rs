// CORS policy
// Reflects the request Origin only when it is in the allow-list, "null" otherwise.
// Never a wildcard: the proxy route may forward Authorization.

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;

use crate::proxy::config::AllowedOrigins;

pub const NULL_ORIGIN: &str = "null";
pub const ALLOW_HEADERS: &str = "Content-Type, Authorization";

/// The two public entry points, each with its own verb list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Proxy,
    Token,
}

impl Endpoint {
    pub fn allow_methods(self) -> &'static str {
        match self {
            Endpoint::Proxy => "GET, OPTIONS",
            Endpoint::Token => "POST, OPTIONS",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CorsPolicy<'a> {
    origins: &'a AllowedOrigins,
    endpoint: Endpoint,
}

impl<'a> CorsPolicy<'a> {
    pub fn new(origins: &'a AllowedOrigins, endpoint: Endpoint) -> Self {
        Self { origins, endpoint }
    }

    /// Access-Control-Allow-Origin value for the given request Origin
    pub fn allow_origin(&self, origin: Option<&str>) -> HeaderValue {
        origin
            .filter(|o| self.origins.contains(o))
            .and_then(|o| HeaderValue::from_str(o).ok())
            .unwrap_or_else(|| HeaderValue::from_static(NULL_ORIGIN))
    }

    /// Overwrite or insert Allow-Origin and Allow-Methods, leaving every other header alone
    pub fn apply(&self, headers: &mut HeaderMap, origin: Option<&str>) {
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            self.allow_origin(origin),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(self.endpoint.allow_methods()),
        );
    }

    /// 204 answer to a CORS preflight
    pub fn preflight(&self, origin: Option<&str>) -> Response {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        let headers = response.headers_mut();
        self.apply(headers, origin);
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        );
        response
    }
}

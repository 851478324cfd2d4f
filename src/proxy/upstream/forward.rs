// Outbound request construction.
// Credentials are attached here and nowhere else.

use axum::http::{header, HeaderMap, HeaderValue, Method};
use bytes::Bytes;
use url::Url;

use crate::proxy::common::target::TargetDescriptor;
use crate::proxy::upstream::client::OutboundRequest;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

fn base_headers(user_agent: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let agent = HeaderValue::from_str(user_agent)
        .unwrap_or_else(|_| HeaderValue::from_static("EasySpeakGateway"));
    headers.insert(header::USER_AGENT, agent);
    headers
}

/// GET for the resource proxy. Authorization is only forwarded to Trusted targets.
pub fn resource_request(
    target: &TargetDescriptor,
    authorization: Option<&HeaderValue>,
    user_agent: &str,
) -> OutboundRequest {
    let mut headers = base_headers(user_agent);
    if target.is_trusted() {
        if let Some(auth) = authorization {
            headers.insert(header::AUTHORIZATION, auth.clone());
        }
    }

    OutboundRequest {
        method: Method::GET,
        url: target.url.clone(),
        headers,
        body: None,
    }
}

/// Form-encoded POST of the caller's secret to the fixed token endpoint
pub fn token_request(endpoint: &Url, secret: &str, user_agent: &str) -> OutboundRequest {
    let mut headers = base_headers(user_agent);
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(FORM_CONTENT_TYPE),
    );

    let body = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("secret", secret.trim())
        .finish();

    OutboundRequest {
        method: Method::POST,
        url: endpoint.clone(),
        headers,
        body: Some(Bytes::from(body)),
    }
}

// Secret -> bearer token exchange against the fixed upstream token endpoint.
// The gateway stores neither the secret nor the token; neither is ever logged.

use axum::http::StatusCode;
use serde_json::Value;
use url::Url;

use crate::error::GatewayError;
use crate::proxy::config::SecurityConfig;
use crate::proxy::upstream::{forward, Transport};

const MAX_TOKEN_RESPONSE_BYTES: usize = 64 * 1024;
const REDACTED: &str = "[redacted]";

/// Pull a non-blank `secret` string out of the inbound JSON body.
/// Returned value is trimmed.
pub fn parse_secret(body: &[u8]) -> Result<String, GatewayError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(GatewayError::MissingSecret);
    }

    let value: Value = serde_json::from_slice(body).map_err(|_| GatewayError::InvalidBody)?;

    value
        .get("secret")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or(GatewayError::MissingSecret)
}

/// Forward the secret and return the upstream JSON with its status.
/// Any non-2xx answer or unparsable payload is an error.
pub async fn exchange_secret(
    transport: &dyn Transport,
    security: &SecurityConfig,
    secret: &str,
) -> Result<(StatusCode, Value), GatewayError> {
    let endpoint = Url::parse(&security.token_endpoint)
        .map_err(|e| GatewayError::TokenExchange(format!("Invalid token endpoint: {}", e)))?;

    let request = forward::token_request(&endpoint, secret, &security.user_agent);

    let response = transport
        .send(request)
        .await
        .map_err(|e| GatewayError::TokenExchange(format!("Token request failed: {}", e)))?;

    let status = response.status;
    if !status.is_success() {
        // Body is dropped unread
        return Err(GatewayError::TokenExchange(format!(
            "Token endpoint responded with status {}",
            status
        )));
    }

    let body = response
        .into_bytes(MAX_TOKEN_RESPONSE_BYTES)
        .await
        .map_err(GatewayError::TokenExchange)?;

    let data: Value = serde_json::from_slice(&body)
        .map_err(|e| GatewayError::TokenExchange(format!("Invalid token response: {}", e)))?;

    Ok((status, data))
}

/// Replace every occurrence of the secret in a client-facing message
pub fn redact(message: &str, secret: &str) -> String {
    if secret.is_empty() {
        return message.to_string();
    }
    message.replace(secret, REDACTED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockReply, MockTransport};
    use axum::http::{header, Method};
    use serde_json::json;

    #[test]
    fn test_parse_secret() {
        assert_eq!(parse_secret(br#"{"secret":"abc"}"#).unwrap(), "abc");
        assert_eq!(parse_secret(br#"{"secret":"  abc \n"}"#).unwrap(), "abc");
    }

    #[test]
    fn test_parse_secret_missing() {
        let bodies: [&[u8]; 7] = [
            b"{}",
            br#"{"secret":""}"#,
            br#"{"secret":"   "}"#,
            br#"{"secret":42}"#,
            b"[]",
            b"",
            b"  ",
        ];
        for body in bodies {
            assert_eq!(parse_secret(body).unwrap_err(), GatewayError::MissingSecret);
        }
    }

    #[test]
    fn test_parse_secret_invalid_json() {
        assert_eq!(parse_secret(b"secret=abc").unwrap_err(), GatewayError::InvalidBody);
    }

    #[test]
    fn test_redact() {
        assert_eq!(redact("bad secret hunter2 given", "hunter2"), "bad secret [redacted] given");
        assert_eq!(redact("no secret here", "hunter2"), "no secret here");
    }

    #[tokio::test]
    async fn test_exchange_success() {
        let transport = MockTransport::replying(MockReply::json(200, r#"{"access_token":"xyz"}"#));
        let security = SecurityConfig::default();

        let (status, data) = exchange_secret(&transport, &security, "abc").await.unwrap();

        assert_eq!(status, StatusCode::OK);
        assert_eq!(data, json!({"access_token": "xyz"}));

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.url.as_str(), security.token_endpoint);
        assert_eq!(request.headers[header::USER_AGENT], "ZipEasySpeak/1.0");
        assert!(request.headers.get(header::AUTHORIZATION).is_none());
        assert_eq!(request.body.as_deref(), Some(&b"secret=abc"[..]));
    }

    #[tokio::test]
    async fn test_exchange_non_success_status() {
        let transport = MockTransport::replying(MockReply::json(401, r#"{"error":"bad secret"}"#));
        let err = exchange_secret(&transport, &SecurityConfig::default(), "abc")
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn test_exchange_unparsable_json() {
        let transport = MockTransport::replying(MockReply::json(200, "<html>oops</html>"));
        let err = exchange_secret(&transport, &SecurityConfig::default(), "abc")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::TokenExchange(_)));
    }

    #[tokio::test]
    async fn test_exchange_transport_failure() {
        let transport = MockTransport::failing("connection reset");
        let err = exchange_secret(&transport, &SecurityConfig::default(), "abc")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Token request failed: connection reset");
    }
}

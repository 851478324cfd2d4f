// Resource proxy handler
// GET|OPTIONS /api/proxy?url=<absolute https URL>

use axum::{
    extract::{RawQuery, State},
    http::{header, HeaderMap, HeaderValue, Method},
    response::Response,
};
use tracing::{debug, error, warn};

use crate::error::{ErrorKind, GatewayError};
use crate::proxy::common::content;
use crate::proxy::common::cors::{CorsPolicy, Endpoint};
use crate::proxy::common::target::{answered_tier, validate_target, TargetDescriptor};
use crate::proxy::mappers::{plain_error, relay_upstream};
use crate::proxy::policy::{classify, origin_header, Admission, RequestFacts};
use crate::proxy::server::AppState;
use crate::proxy::upstream::{forward, UpstreamResponse};

/// First `url` query parameter, percent-decoded. An empty value counts as absent.
fn url_param(query: Option<&str>) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(key, _)| key == "url")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

pub async fn handle_proxy(
    State(state): State<AppState>,
    method: Method,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    let security = &state.security;
    let origin = origin_header(&headers);
    let cors = CorsPolicy::new(&security.allowed_origins, Endpoint::Proxy);

    let target_url = url_param(query.as_deref());
    let input = match target_url {
        Some(_) => Ok(()),
        None => Err(GatewayError::MissingUrl),
    };
    let facts = RequestFacts::new(&method, &headers, &security.allowed_origins, input)
        .with_target(target_url.as_deref().map(|u| validate_target(u, security)));

    let target = match classify(facts) {
        Admission::Preflight => return cors.preflight(origin),
        Admission::Deny(reason) => {
            warn!("Proxy request denied: {}", reason);
            return plain_error(&reason, &cors, origin);
        }
        Admission::Allow(Some(target)) => target,
        Admission::Allow(None) => return plain_error(&GatewayError::MissingUrl, &cors, origin),
    };

    match fetch(&state, &target, headers.get(header::AUTHORIZATION)).await {
        Ok(upstream) => {
            debug!(
                "Relaying {} from {} ({:?})",
                upstream.status, target.hostname, target.tier
            );
            relay_upstream(upstream, &cors, origin)
        }
        Err(reason) => {
            match reason.kind() {
                ErrorKind::Upstream => {
                    error!("Proxy fetch to {} failed: {}", target.hostname, reason)
                }
                _ => warn!("Proxy response from {} denied: {}", target.hostname, reason),
            }
            plain_error(&reason, &cors, origin)
        }
    }
}

/// Outbound call plus the post-fetch content gate. A rejected response is
/// dropped here, so its body is never read.
async fn fetch(
    state: &AppState,
    target: &TargetDescriptor,
    authorization: Option<&HeaderValue>,
) -> Result<UpstreamResponse, GatewayError> {
    let request = forward::resource_request(target, authorization, &state.security.user_agent);

    let upstream = state
        .upstream
        .send(request)
        .await
        .map_err(GatewayError::Fetch)?;

    // The gate follows whoever answered, which differs from the target after a redirect
    let tier = answered_tier(target, &upstream.url, &state.security);
    if tier != target.tier {
        warn!(
            "Trusted target {} redirected to untrusted {}",
            target.hostname,
            upstream.url.host_str().unwrap_or_default()
        );
    }
    content::check_response(tier, &upstream.headers)?;
    Ok(upstream)
}

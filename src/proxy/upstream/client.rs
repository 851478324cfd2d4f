// Upstream client implementation
// The only place the gateway touches the network.

use axum::http::{HeaderMap, Method, StatusCode};
use bytes::{Bytes, BytesMut};
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt, TryStreamExt};
use reqwest::{redirect, Client};
use url::Url;

use crate::error::{AppError, AppResult};
use crate::proxy::common::target::redirect_allowed;
use crate::proxy::config::UpstreamProxyConfig;

const MAX_REDIRECTS: usize = 5;

pub type BodyStream = BoxStream<'static, Result<Bytes, axum::BoxError>>;

/// Fully-specified outbound call. Only the headers set here are sent.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

/// Upstream answer with the body left as a stream
pub struct UpstreamResponse {
    /// Where the answer actually came from, after redirects
    pub url: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: BodyStream,
}

impl UpstreamResponse {
    /// Collect the body, failing once more than `limit` bytes arrive.
    /// Only used for small JSON payloads (token exchange).
    pub async fn into_bytes(self, limit: usize) -> Result<Bytes, String> {
        let mut body = self.body;
        let mut buffer = BytesMut::new();
        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|e| format!("Failed to read upstream body: {}", e))?
        {
            if buffer.len() + chunk.len() > limit {
                return Err(format!("Upstream body exceeds {} bytes", limit));
            }
            buffer.extend_from_slice(&chunk);
        }
        Ok(buffer.freeze())
    }
}

/// Seam between the pipelines and the network
pub trait Transport: Send + Sync {
    fn send(&self, request: OutboundRequest) -> BoxFuture<'_, Result<UpstreamResponse, String>>;
}

pub struct UpstreamClient {
    http_client: Client,
}

impl UpstreamClient {
    pub fn new(proxy_config: Option<&UpstreamProxyConfig>, block_ip_literals: bool) -> AppResult<Self> {
        // Redirects get the same scheme / literal screening as the original target
        let policy = redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() >= MAX_REDIRECTS {
                attempt.error("too many redirects")
            } else if redirect_allowed(attempt.url(), block_ip_literals) {
                attempt.follow()
            } else {
                attempt.error("redirect target not allowed")
            }
        });

        let mut builder = Client::builder().redirect(policy);

        if let Some(config) = proxy_config {
            if config.enabled && !config.url.is_empty() {
                let proxy = reqwest::Proxy::all(&config.url).map_err(|e| {
                    AppError::Config(format!("Invalid upstream proxy {}: {}", config.url, e))
                })?;
                builder = builder.proxy(proxy);
                tracing::info!("UpstreamClient enabled proxy: {}", config.url);
            }
        }

        let http_client = builder.build()?;

        Ok(Self { http_client })
    }

    async fn execute(&self, request: OutboundRequest) -> Result<UpstreamResponse, String> {
        let mut builder = self
            .http_client
            .request(request.method, request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| e.to_string())?;

        let url = response.url().clone();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes_stream()
            .map_err(axum::BoxError::from)
            .boxed();

        Ok(UpstreamResponse {
            url,
            status,
            headers,
            body,
        })
    }
}

impl Transport for UpstreamClient {
    fn send(&self, request: OutboundRequest) -> BoxFuture<'_, Result<UpstreamResponse, String>> {
        self.execute(request).boxed()
    }
}

//! Test helpers: a recording `Transport` that never touches the network.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use bytes::Bytes;
use futures::future::{self, BoxFuture};
use futures::{stream, FutureExt, StreamExt};
use url::Url;

use crate::proxy::upstream::{OutboundRequest, Transport, UpstreamResponse};

/// Canned upstream answer
#[derive(Debug, Clone)]
pub struct MockReply {
    pub status: u16,
    pub headers: Vec<(&'static str, &'static str)>,
    pub body: Vec<u8>,
    /// Final URL after redirects; the request URL when None
    pub final_url: Option<&'static str>,
}

impl MockReply {
    pub fn new(status: u16, content_type: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: vec![("content-type", content_type)],
            body: body.into(),
            final_url: None,
        }
    }

    pub fn json(status: u16, body: &str) -> Self {
        Self::new(status, "application/json", body)
    }

    pub fn with_header(mut self, name: &'static str, value: &'static str) -> Self {
        self.headers.push((name, value));
        self
    }

    pub fn redirected_to(mut self, url: &'static str) -> Self {
        self.final_url = Some(url);
        self
    }
}

#[derive(Debug, Clone)]
enum Behavior {
    Reply(Result<MockReply, String>),
    /// `send` never resolves
    Hang,
    Panic,
}

/// Raises its flag when dropped
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

pub struct MockTransport {
    behavior: Behavior,
    calls: AtomicUsize,
    requests: Mutex<Vec<OutboundRequest>>,
    body_polled: Arc<AtomicBool>,
    send_dropped: Arc<AtomicBool>,
}

impl MockTransport {
    pub fn replying(reply: MockReply) -> Self {
        Self::with_behavior(Behavior::Reply(Ok(reply)))
    }

    pub fn failing(message: &str) -> Self {
        Self::with_behavior(Behavior::Reply(Err(message.to_string())))
    }

    /// Outbound call that stays in flight until its future is dropped
    pub fn hanging() -> Self {
        Self::with_behavior(Behavior::Hang)
    }

    pub fn panicking() -> Self {
        Self::with_behavior(Behavior::Panic)
    }

    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            body_polled: Arc::new(AtomicBool::new(false)),
            send_dropped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Whether anyone ever read from a response body handed out by this transport
    pub fn body_polled(&self) -> bool {
        self.body_polled.load(Ordering::SeqCst)
    }

    /// Whether an in-flight `send` future was dropped (hanging mode only)
    pub fn send_dropped(&self) -> bool {
        self.send_dropped.load(Ordering::SeqCst)
    }
}

impl Transport for MockTransport {
    fn send(&self, request: OutboundRequest) -> BoxFuture<'_, Result<UpstreamResponse, String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let request_url = request.url.clone();
        self.requests.lock().unwrap().push(request);

        let reply = match &self.behavior {
            Behavior::Reply(reply) => reply.clone(),
            Behavior::Hang => {
                let flag = DropFlag(self.send_dropped.clone());
                return async move {
                    let _flag = flag;
                    future::pending::<Result<UpstreamResponse, String>>().await
                }
                .boxed();
            }
            Behavior::Panic => panic!("transport exploded"),
        };

        let result = reply.map(|reply| {
            let mut headers = HeaderMap::new();
            for (name, value) in reply.headers {
                headers.append(
                    HeaderName::from_static(name),
                    HeaderValue::from_static(value),
                );
            }

            let polled = self.body_polled.clone();
            let bytes = Bytes::from(reply.body);
            let body = stream::once(async move {
                polled.store(true, Ordering::SeqCst);
                Ok::<Bytes, axum::BoxError>(bytes)
            })
            .boxed();

            UpstreamResponse {
                url: reply
                    .final_url
                    .map(|u| Url::parse(u).unwrap())
                    .unwrap_or(request_url),
                status: StatusCode::from_u16(reply.status).unwrap(),
                headers,
                body,
            }
        });

        async move { result }.boxed()
    }
}

pub mod client;
pub mod forward;

pub use client::{OutboundRequest, Transport, UpstreamClient, UpstreamResponse};

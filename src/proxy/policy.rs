// Request classification
// Inbound checks run as an ordered chain and stop at the first decision.
// The content-type gate runs after the fetch (see common::content).

use axum::http::{header, HeaderMap, Method};

use crate::error::GatewayError;
use crate::proxy::common::target::TargetDescriptor;
use crate::proxy::config::AllowedOrigins;

const CROSS_SITE: &str = "cross-site";
const SEC_FETCH_SITE: &str = "sec-fetch-site";

/// Everything the chain needs, extracted once per request
pub struct RequestFacts<'a> {
    pub method: &'a Method,
    pub origin: Option<&'a str>,
    pub fetch_site: Option<&'a str>,
    pub origins: &'a AllowedOrigins,
    /// Err when the required input (`url` or `secret`) is absent or unreadable
    pub input: Result<(), GatewayError>,
    /// Parsed proxy target; None on routes without one
    pub target: Option<Result<TargetDescriptor, GatewayError>>,
}

impl<'a> RequestFacts<'a> {
    pub fn new(
        method: &'a Method,
        headers: &'a HeaderMap,
        origins: &'a AllowedOrigins,
        input: Result<(), GatewayError>,
    ) -> Self {
        Self {
            method,
            origin: origin_header(headers),
            fetch_site: headers
                .get(SEC_FETCH_SITE)
                .and_then(|v| v.to_str().ok()),
            origins,
            input,
            target: None,
        }
    }

    pub fn with_target(mut self, target: Option<Result<TargetDescriptor, GatewayError>>) -> Self {
        self.target = target;
        self
    }
}

/// An Origin header that is present but not visible ASCII reads as "" so it
/// can never match the allow-list.
pub fn origin_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::ORIGIN)
        .map(|v| v.to_str().unwrap_or_default())
}

#[derive(Debug)]
pub enum Admission {
    /// CORS preflight, answer 204 and stop
    Preflight,
    Deny(GatewayError),
    Allow(Option<TargetDescriptor>),
}

enum Step {
    Next,
    Preflight,
    Deny(GatewayError),
}

type Rule = fn(&RequestFacts<'_>) -> Step;

/// Precedence is the order of this list
static RULES: [(&str, Rule); 5] = [
    ("preflight", preflight_rule),
    ("input", input_rule),
    ("site", site_rule),
    ("origin", origin_rule),
    ("target", target_rule),
];

pub fn rule_names() -> impl Iterator<Item = &'static str> {
    RULES.iter().map(|(name, _)| *name)
}

pub fn classify(facts: RequestFacts<'_>) -> Admission {
    for (name, rule) in RULES.iter() {
        match rule(&facts) {
            Step::Next => continue,
            Step::Preflight => return Admission::Preflight,
            Step::Deny(reason) => {
                tracing::debug!("Rule {} denied request: {}", name, reason);
                return Admission::Deny(reason);
            }
        }
    }
    Admission::Allow(facts.target.and_then(Result::ok))
}

fn preflight_rule(facts: &RequestFacts<'_>) -> Step {
    if facts.method == Method::OPTIONS {
        Step::Preflight
    } else {
        Step::Next
    }
}

fn input_rule(facts: &RequestFacts<'_>) -> Step {
    match &facts.input {
        Ok(()) => Step::Next,
        Err(e) => Step::Deny(e.clone()),
    }
}

// Browser-generated, page script cannot forge it. Absent for non-browser clients.
fn site_rule(facts: &RequestFacts<'_>) -> Step {
    if facts.fetch_site == Some(CROSS_SITE) {
        Step::Deny(GatewayError::CrossSite)
    } else {
        Step::Next
    }
}

// Absent Origin passes: same-origin GETs and non-browser clients omit it.
fn origin_rule(facts: &RequestFacts<'_>) -> Step {
    match facts.origin {
        Some(origin) if !facts.origins.contains(origin) => Step::Deny(GatewayError::InvalidOrigin),
        _ => Step::Next,
    }
}

fn target_rule(facts: &RequestFacts<'_>) -> Step {
    match &facts.target {
        Some(Err(e)) => Step::Deny(e.clone()),
        _ => Step::Next,
    }
}

// Target validation
// Parses the requested URL, enforces https and assigns a trust tier.
// No DNS resolution happens here: only literal hosts can be screened.

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, Ipv6Addr};
use url::{Host, Url};

use crate::error::GatewayError;
use crate::proxy::config::SecurityConfig;

/// Trusted targets receive the caller's Authorization header and bypass the
/// content-type gate. Everything else is Untrusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustTier {
    Trusted,
    Untrusted,
}

#[derive(Debug, Clone)]
pub struct TargetDescriptor {
    pub url: Url,
    pub hostname: String,
    pub tier: TrustTier,
}

impl TargetDescriptor {
    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    pub fn is_trusted(&self) -> bool {
        self.tier == TrustTier::Trusted
    }
}

pub fn validate_target(raw: &str, security: &SecurityConfig) -> Result<TargetDescriptor, GatewayError> {
    let url = Url::parse(raw).map_err(|_| GatewayError::InvalidUrl)?;

    if url.scheme() != "https" {
        return Err(GatewayError::InsecureScheme);
    }

    let host = url.host().ok_or(GatewayError::InvalidUrl)?;
    if security.block_ip_literals && is_local_literal(&host) {
        return Err(GatewayError::PrivateTarget);
    }

    let hostname = host.to_string();
    let tier = security.trust_table.tier_for(&hostname);

    Ok(TargetDescriptor {
        url,
        hostname,
        tier,
    })
}

/// Tier of the host that actually answered. Trust does not survive a
/// redirect onto a host outside the trust table.
pub fn answered_tier(target: &TargetDescriptor, final_url: &Url, security: &SecurityConfig) -> TrustTier {
    if !target.is_trusted() {
        return TrustTier::Untrusted;
    }
    match final_url.host() {
        Some(host) => security.trust_table.tier_for(&host.to_string()),
        None => TrustTier::Untrusted,
    }
}

/// Whether an upstream redirect may be followed: https only, and not to a
/// local literal when literal blocking is on.
pub fn redirect_allowed(url: &Url, block_ip_literals: bool) -> bool {
    if url.scheme() != "https" {
        return false;
    }
    match url.host() {
        Some(host) => !(block_ip_literals && is_local_literal(&host)),
        None => false,
    }
}

fn is_local_literal(host: &Host<&str>) -> bool {
    match host {
        Host::Domain(domain) => {
            let domain = domain.trim_end_matches('.');
            domain == "localhost" || domain.ends_with(".localhost")
        }
        Host::Ipv4(ip) => is_local_v4(ip),
        Host::Ipv6(ip) => is_local_v6(ip),
    }
}

fn is_local_v4(ip: &Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        // 100.64.0.0/10 carrier-grade NAT
        || (a == 100 && (b & 0xc0) == 64)
}

fn is_local_v6(ip: &Ipv6Addr) -> bool {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_local_v4(&v4);
    }
    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        // fc00::/7 unique local
        || (first & 0xfe00) == 0xfc00
        // fe80::/10 link local
        || (first & 0xffc0) == 0xfe80
}

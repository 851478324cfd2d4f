use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::proxy::common::target::TrustTier;

const DEFAULT_PORT: u16 = 8787;
const DEFAULT_TOKEN_ENDPOINT: &str = "https://www.opensymbols.org/api/v2/token";
const DEFAULT_USER_AGENT: &str = "ZipEasySpeak/1.0";
const DEFAULT_TRUSTED_HOST: &str = "www.opensymbols.org";
const DEFAULT_ORIGINS: [&str; 2] = [
    "https://easyspeak.zipsolutions.org",
    "https://zipeasyspeak.pages.dev",
];

/// Listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Whether to listen on all interfaces
    /// - false: 127.0.0.1 only
    /// - true: 0.0.0.0
    #[serde(default)]
    pub allow_lan_access: bool,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Outbound proxy for every upstream call
    #[serde(default)]
    pub upstream_proxy: UpstreamProxyConfig,
}

/// Outbound proxy configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpstreamProxyConfig {
    pub enabled: bool,
    /// Proxy address (http://, https://, socks5://)
    pub url: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            allow_lan_access: false,
            port: default_port(),
            upstream_proxy: UpstreamProxyConfig::default(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl ProxyConfig {
    pub fn get_bind_address(&self) -> &str {
        if self.allow_lan_access {
            "0.0.0.0"
        } else {
            "127.0.0.1"
        }
    }
}

/// Exact-string set of browser origins allowed to call the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct AllowedOrigins(HashSet<String>);

impl AllowedOrigins {
    pub fn new<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(origins.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, origin: &str) -> bool {
        self.0.contains(origin)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for AllowedOrigins {
    fn default() -> Self {
        Self::new(DEFAULT_ORIGINS)
    }
}

/// Hostname -> trust tier. Hosts not listed are Untrusted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct TrustTable(HashMap<String, TrustTier>);

impl TrustTable {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, TrustTier)>,
        S: Into<String>,
    {
        Self(entries.into_iter().map(|(h, t)| (h.into(), t)).collect())
    }

    /// Shorthand for a table where every listed host is Trusted
    pub fn trusted<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(hosts.into_iter().map(|h| (h, TrustTier::Trusted)))
    }

    /// Case-sensitive exact lookup
    pub fn tier_for(&self, hostname: &str) -> TrustTier {
        self.0
            .get(hostname)
            .copied()
            .unwrap_or(TrustTier::Untrusted)
    }

    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl Default for TrustTable {
    fn default() -> Self {
        Self::trusted([DEFAULT_TRUSTED_HOST])
    }
}

/// Request-validation policy, immutable after startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default)]
    pub allowed_origins: AllowedOrigins,

    #[serde(default)]
    pub trust_table: TrustTable,

    /// Fixed upstream used by the token exchange
    #[serde(default = "default_token_endpoint")]
    pub token_endpoint: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Reject literal loopback/private IP hosts (no DNS involved)
    #[serde(default = "default_true")]
    pub block_ip_literals: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allowed_origins: AllowedOrigins::default(),
            trust_table: TrustTable::default(),
            token_endpoint: default_token_endpoint(),
            user_agent: default_user_agent(),
            block_ip_literals: true,
        }
    }
}

fn default_token_endpoint() -> String {
    DEFAULT_TOKEN_ENDPOINT.to_string()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_address() {
        let mut config = ProxyConfig::default();
        assert_eq!(config.get_bind_address(), "127.0.0.1");
        config.allow_lan_access = true;
        assert_eq!(config.get_bind_address(), "0.0.0.0");
    }

    #[test]
    fn test_trust_table_is_exact_and_case_sensitive() {
        let table = TrustTable::trusted(["www.opensymbols.org"]);
        assert_eq!(table.tier_for("www.opensymbols.org"), TrustTier::Trusted);
        assert_eq!(table.tier_for("WWW.opensymbols.org"), TrustTier::Untrusted);
        assert_eq!(table.tier_for("opensymbols.org"), TrustTier::Untrusted);
        assert_eq!(
            table.tier_for("www.opensymbols.org.evil.test"),
            TrustTier::Untrusted
        );
    }

    #[test]
    fn test_security_config_deserialize_defaults() {
        let config: SecurityConfig = serde_json::from_str(r#"{"trust_table": {"a.test": "trusted", "b.test": "untrusted"}}"#).unwrap();
        assert_eq!(config.trust_table.tier_for("a.test"), TrustTier::Trusted);
        assert_eq!(config.trust_table.tier_for("b.test"), TrustTier::Untrusted);
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
        assert!(config.block_ip_literals);
        assert!(config.allowed_origins.contains("https://zipeasyspeak.pages.dev"));
    }
}

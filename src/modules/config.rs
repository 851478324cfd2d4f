use std::path::PathBuf;

use crate::error::{AppError, AppResult};
use crate::models::AppConfig;
use crate::proxy::common::target::TrustTier;
use crate::proxy::config::{AllowedOrigins, TrustTable, UpstreamProxyConfig};

const ENV_PORT: &str = "GATEWAY_PORT";
const ENV_ALLOW_LAN: &str = "GATEWAY_ALLOW_LAN";
const ENV_ALLOWED_ORIGINS: &str = "GATEWAY_ALLOWED_ORIGINS";
const ENV_TRUSTED_HOSTS: &str = "GATEWAY_TRUSTED_HOSTS";
const ENV_TOKEN_ENDPOINT: &str = "GATEWAY_TOKEN_ENDPOINT";
const ENV_USER_AGENT: &str = "GATEWAY_USER_AGENT";
const ENV_UPSTREAM_PROXY: &str = "GATEWAY_UPSTREAM_PROXY";
const ENV_BLOCK_IP_LITERALS: &str = "GATEWAY_BLOCK_IP_LITERALS";
const ENV_LOG_DIR: &str = "GATEWAY_LOG_DIR";

/// Load application config from the process environment
pub fn load_app_config() -> AppResult<AppConfig> {
    load_app_config_from(|key| std::env::var(key).ok())
}

/// Load application config through an arbitrary variable lookup.
/// Unset variables keep their defaults.
pub fn load_app_config_from<F>(lookup: F) -> AppResult<AppConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = AppConfig::new();
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(port) = get(ENV_PORT) {
        config.proxy.port = port
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{} is not a valid port: {}", ENV_PORT, e)))?;
    }
    if let Some(flag) = get(ENV_ALLOW_LAN) {
        config.proxy.allow_lan_access = parse_bool(ENV_ALLOW_LAN, &flag)?;
    }
    if let Some(url) = get(ENV_UPSTREAM_PROXY) {
        config.proxy.upstream_proxy = UpstreamProxyConfig {
            enabled: true,
            url: url.trim().to_string(),
        };
    }

    if let Some(origins) = get(ENV_ALLOWED_ORIGINS) {
        config.security.allowed_origins = AllowedOrigins::new(split_list(&origins));
    }
    if let Some(hosts) = get(ENV_TRUSTED_HOSTS) {
        config.security.trust_table =
            TrustTable::new(split_list(&hosts).map(|h| (h, TrustTier::Trusted)));
    }
    if let Some(endpoint) = get(ENV_TOKEN_ENDPOINT) {
        config.security.token_endpoint = endpoint.trim().to_string();
    }
    if let Some(agent) = get(ENV_USER_AGENT) {
        config.security.user_agent = agent.trim().to_string();
    }
    if let Some(flag) = get(ENV_BLOCK_IP_LITERALS) {
        config.security.block_ip_literals = parse_bool(ENV_BLOCK_IP_LITERALS, &flag)?;
    }
    if let Some(dir) = get(ENV_LOG_DIR) {
        config.log_dir = Some(PathBuf::from(dir.trim()));
    }

    validate(&config)?;
    Ok(config)
}

fn validate(config: &AppConfig) -> AppResult<()> {
    let endpoint = url::Url::parse(&config.security.token_endpoint).map_err(|e| {
        AppError::Config(format!(
            "token endpoint {} is not a valid URL: {}",
            config.security.token_endpoint, e
        ))
    })?;
    if endpoint.scheme() != "https" {
        return Err(AppError::Config(
            "token endpoint must use https".to_string(),
        ));
    }

    Ok(())
}

/// Log the effective policy once the logger is up
pub fn log_config_summary(config: &AppConfig) {
    let security = &config.security;
    tracing::info!(
        "Gateway policy: {} allowed origin(s), trusted hosts [{}], block IP literals: {}",
        security.allowed_origins.len(),
        security.trust_table.hosts().collect::<Vec<_>>().join(", "),
        security.block_ip_literals
    );

    if security.allowed_origins.is_empty() {
        tracing::warn!("No allowed origins configured, every browser request with an Origin will be rejected");
    }

    // Parsed hostnames are lowercase, so an uppercase entry can never match
    for host in security.trust_table.hosts() {
        if host.chars().any(|c| c.is_ascii_uppercase()) {
            tracing::warn!("Trusted host {} contains uppercase characters and will never match", host);
        }
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = String> + '_ {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_bool(key: &str, raw: &str) -> AppResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(AppError::Config(format!(
            "{} expects a boolean, got {}",
            key, other
        ))),
    }
}

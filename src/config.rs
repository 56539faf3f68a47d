use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_PORT: u16 = 9235;
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 100 * 1024 * 1024;

/// Per-instance proxy configuration.
///
/// Loaded from YAML (every key optional), then overridden by `PROXILATE_*`
/// environment variables and finally by command-line flags.
///
/// ```yaml
/// port: 9235
/// username: bruce
/// password: batman
/// forbidden_hosts: [google.com]
/// proxy_timeout_ms: 1000
/// target: http://127.0.0.1:7000   # reverse-proxy mode
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProxyConfig {
    /// Address the listener binds to.
    pub host: IpAddr,
    /// Listener port; 0 picks an ephemeral port.
    pub port: u16,
    /// Setting either credential enables the Basic Auth gate.
    pub username: Option<String>,
    pub password: Option<String>,
    /// Destination hostnames that are never contacted (exact match).
    pub forbidden_hosts: HashSet<String>,
    /// Bound on a whole backend fetch. Unset means no bound.
    #[serde(rename = "proxy_timeout_ms", deserialize_with = "duration_ms")]
    pub proxy_timeout: Option<Duration>,
    /// Fixed destination origin; switches the proxy to reverse-proxy mode.
    pub target: Option<Url>,
    /// Largest inbound request body that will be buffered.
    pub max_body_bytes: usize,
    /// Largest destination response body that will be buffered for relay.
    pub max_response_bytes: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            username: None,
            password: None,
            forbidden_hosts: HashSet::new(),
            proxy_timeout: None,
            target: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }
}

fn duration_ms<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
    Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
}

impl ProxyConfig {
    /// Reads the optional YAML file, applies the process environment and
    /// validates the result.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&raw)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Applies `PROXILATE_*` overrides fetched through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Env { key, value })
        }

        if let Some(value) = lookup("PROXILATE_HOST") {
            self.host = parse("PROXILATE_HOST", value)?;
        }
        if let Some(value) = lookup("PROXILATE_PORT") {
            self.port = parse("PROXILATE_PORT", value)?;
        }
        if let Some(value) = lookup("PROXILATE_USERNAME") {
            self.username = Some(value);
        }
        if let Some(value) = lookup("PROXILATE_PASSWORD") {
            self.password = Some(value);
        }
        if let Some(value) = lookup("PROXILATE_TARGET") {
            self.target = Some(parse("PROXILATE_TARGET", value)?);
        }
        if let Some(value) = lookup("PROXILATE_FORBIDDEN_HOSTS") {
            self.forbidden_hosts = value
                .split(',')
                .map(str::trim)
                .filter(|host| !host.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(value) = lookup("PROXILATE_PROXY_TIMEOUT_MS") {
            let millis: u64 = parse("PROXILATE_PROXY_TIMEOUT_MS", value)?;
            self.proxy_timeout = Some(Duration::from_millis(millis));
        }
        if let Some(value) = lookup("PROXILATE_MAX_BODY_BYTES") {
            self.max_body_bytes = parse("PROXILATE_MAX_BODY_BYTES", value)?;
        }
        if let Some(value) = lookup("PROXILATE_MAX_RESPONSE_BYTES") {
            self.max_response_bytes = parse("PROXILATE_MAX_RESPONSE_BYTES", value)?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(target) = &self.target {
            if !matches!(target.scheme(), "http" | "https") {
                return Err(ConfigError::Invalid(format!(
                    "target {target} must use http or https"
                )));
            }
            if target.host_str().is_none_or(str::is_empty) {
                return Err(ConfigError::Invalid(format!("target {target} has no host")));
            }
            if target.query().is_some() || target.fragment().is_some() {
                return Err(ConfigError::Invalid(format!(
                    "target {target} must not carry a query or fragment"
                )));
            }
        }

        if self.proxy_timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(ConfigError::Invalid("proxy_timeout_ms must be positive".into()));
        }

        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid("max_body_bytes must be positive".into()));
        }

        if self.max_response_bytes == 0 {
            return Err(ConfigError::Invalid("max_response_bytes must be positive".into()));
        }

        if self.forbidden_hosts.iter().any(|host| host.trim().is_empty()) {
            return Err(ConfigError::Invalid("forbidden_hosts contains an empty hostname".into()));
        }

        Ok(())
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn auth_enabled(&self) -> bool {
        self.username.is_some() || self.password.is_some()
    }

    pub fn is_reverse_proxy(&self) -> bool {
        self.target.is_some()
    }
}

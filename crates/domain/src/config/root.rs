use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use super::cache::CacheConfig;
use super::errors::ConfigError;
use super::logging::LoggingConfig;
use super::server::ServerConfig;
use super::stub::StubConfig;
use super::upstream::{QueryMode, UpstreamConfig};

/// Main configuration structure for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Classical DNS front-end (listen address, UDP/TCP toggles)
    #[serde(default)]
    pub server: ServerConfig,

    /// DoH upstream
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Response cache
    #[serde(default)]
    pub cache: CacheConfig,

    /// Optional HTTP stub front
    #[serde(default)]
    pub stub: StubConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Flags that override file-based configuration.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub listen: Option<String>,
    pub endpoint: Option<String>,
    pub endpoint_ips: Option<Vec<IpAddr>>,
    pub edns_subnet: Option<String>,
    pub no_aaaa: Option<bool>,
    pub cacert: Option<String>,
    pub http2: Option<bool>,
    pub dns_resolver: Option<String>,
    pub mode: Option<QueryMode>,
    pub cache: Option<bool>,
    pub udp: Option<bool>,
    pub tcp: Option<bool>,
    pub headers: Vec<String>,
    pub params: Vec<String>,
    pub log_level: Option<String>,
}

impl Config {
    /// Load configuration from file or use defaults.
    ///
    /// Priority order:
    /// 1. Explicitly provided path
    /// 2. doh-proxy.toml in current directory
    /// 3. /etc/doh-proxy/config.toml
    /// 4. Default configuration
    pub fn load(path: Option<&str>, cli_overrides: CliOverrides) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = path {
            Self::from_file(path)?
        } else if std::path::Path::new("doh-proxy.toml").exists() {
            Self::from_file("doh-proxy.toml")?
        } else if std::path::Path::new("/etc/doh-proxy/config.toml").exists() {
            Self::from_file("/etc/doh-proxy/config.toml")?
        } else {
            Self::default()
        };

        config.apply_cli_overrides(cli_overrides);
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_string(), e.to_string()))?;
        toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    fn apply_cli_overrides(&mut self, overrides: CliOverrides) {
        if let Some(listen) = overrides.listen {
            self.server.listen = listen;
        }
        if let Some(endpoint) = overrides.endpoint {
            self.upstream.endpoint = endpoint;
        }
        if let Some(ips) = overrides.endpoint_ips {
            self.upstream.endpoint_ips = ips;
        }
        if let Some(subnet) = overrides.edns_subnet {
            self.upstream.edns_subnet = subnet;
        }
        if let Some(no_aaaa) = overrides.no_aaaa {
            self.upstream.no_aaaa = no_aaaa;
        }
        if let Some(cacert) = overrides.cacert {
            self.upstream.cacert = Some(cacert);
        }
        if let Some(http2) = overrides.http2 {
            self.upstream.http2 = http2;
        }
        if let Some(resolver) = overrides.dns_resolver {
            self.upstream.dns_resolver = Some(resolver);
        }
        if let Some(mode) = overrides.mode {
            self.upstream.mode = mode;
        }
        if let Some(cache) = overrides.cache {
            self.cache.enabled = cache;
        }
        if let Some(udp) = overrides.udp {
            self.server.udp = udp;
        }
        if let Some(tcp) = overrides.tcp {
            self.server.tcp = tcp;
        }
        if !overrides.headers.is_empty() {
            self.upstream.headers.extend(overrides.headers);
        }
        if !overrides.params.is_empty() {
            self.upstream.params.extend(overrides.params);
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
    }
}

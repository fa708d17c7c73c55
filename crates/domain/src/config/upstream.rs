use super::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// How queries are encoded on the wire towards the DoH endpoint.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    /// RFC 8484 GET with the packed message in the `dns` parameter.
    #[default]
    Wire,
    /// `dns.google/resolve`-style GET; the body is still a packed message.
    Resolve,
    /// JSON API; the response is translated back into a DNS message.
    Json,
}

impl QueryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wire => "wire",
            Self::Resolve => "resolve",
            Self::Json => "json",
        }
    }
}

/// DoH upstream configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// DNS-over-HTTPS endpoint URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Endpoint IPs dialed directly, skipping endpoint host lookup.
    /// One is chosen at random per connection; TLS still verifies the
    /// endpoint host name.
    #[serde(default)]
    pub endpoint_ips: Vec<IpAddr>,

    /// `no`, `auto`, or an explicit `net/mask` client subnet.
    #[serde(default = "default_edns_subnet")]
    pub edns_subnet: String,

    /// Reply to all AAAA questions with an empty answer and prefer IPv4
    /// when dialing the endpoint.
    #[serde(default)]
    pub no_aaaa: bool,

    /// Optional PEM root CA used for TLS establishment.
    #[serde(default)]
    pub cacert: Option<String>,

    /// Allow HTTP/2 for upstream connections.
    #[serde(default)]
    pub http2: bool,

    /// Plaintext resolver (`ip` or `ip:port`) used to resolve the DoH
    /// endpoint host itself.
    #[serde(default)]
    pub dns_resolver: Option<String>,

    #[serde(default)]
    pub mode: QueryMode,

    /// Additional headers sent with every upstream request, as `Key=Value`.
    #[serde(default)]
    pub headers: Vec<String>,

    /// Additional query parameters for every upstream request, as `key=value`.
    #[serde(default)]
    pub params: Vec<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            endpoint_ips: Vec::new(),
            edns_subnet: default_edns_subnet(),
            no_aaaa: false,
            cacert: None,
            http2: false,
            dns_resolver: None,
            mode: QueryMode::default(),
            headers: Vec::new(),
            params: Vec::new(),
        }
    }
}

fn default_endpoint() -> String {
    "https://dns.google/dns-query".to_string()
}

fn default_edns_subnet() -> String {
    "auto".to_string()
}

/// Parses a comma-separated IP list, skipping empty items.
pub fn parse_ip_csv(csv: &str) -> Result<Vec<IpAddr>, ConfigError> {
    let mut ips = Vec::new();
    for item in csv.split(',') {
        if item.is_empty() {
            continue;
        }
        let ip = item
            .parse()
            .map_err(|_| ConfigError::InvalidIp(item.to_string()))?;
        ips.push(ip);
    }
    Ok(ips)
}

/// Parses repeated `key=value` strings, keeping duplicates in order.
pub fn parse_key_values(items: &[String]) -> Result<Vec<(String, String)>, ConfigError> {
    let mut pairs = Vec::with_capacity(items.len());
    for item in items {
        let (key, value) = item
            .split_once('=')
            .ok_or_else(|| ConfigError::InvalidKeyValue(item.clone()))?;
        pairs.push((key.to_string(), value.to_string()));
    }
    Ok(pairs)
}

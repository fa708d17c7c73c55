//! DNS-over-HTTPS provider.
//!
//! One provider serves one endpoint in one of three query modes (RFC 8484
//! wire GET, `resolve`-style GET, JSON API). The modes share the HTTP
//! client, the endpoint address resolution, the deterministic padding and
//! the client-subnet policy; only request encoding and response decoding
//! differ.

mod endpoint;
mod http;
mod json;
pub mod request;
pub mod subnet;

use crate::dns::bootstrap::BootstrapResolver;
use async_trait::async_trait;
use doh_proxy_application::ports::DnsProvider;
use doh_proxy_domain::message::edns::{set_client_subnet, ClientSubnet};
use doh_proxy_domain::message::{reply_to, stamp_reply};
use doh_proxy_domain::{DomainError, QueryMode};
use endpoint::EndpointAddressResolver;
use hickory_proto::op::Message;
use hickory_proto::rr::RecordType;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use subnet::ExternalSubnetProbe;
use tracing::{debug, warn};
use url::Url;

pub use request::DNS_MESSAGE_CONTENT_TYPE;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const KEEP_ALIVE: Duration = Duration::from_secs(300);

/// Fallback resolver for the IP-echo probes when the operator supplied
/// none.
const PROBE_FALLBACK_RESOLVER: &str = "8.8.8.8";

#[derive(Debug, Clone)]
pub struct DohProviderOptions {
    /// Endpoint IPs dialed directly, skipping host resolution; one is
    /// chosen at random per connection.
    pub endpoint_ips: Vec<IpAddr>,
    /// `no`, `auto`, or an explicit CIDR.
    pub edns_subnet: String,
    /// Extra headers for every upstream request.
    pub headers: Vec<(String, String)>,
    /// Extra query parameters for parameterized modes.
    pub query_params: Vec<(String, String)>,
    pub http2: bool,
    pub ca_cert_path: Option<PathBuf>,
    /// Reply to AAAA questions with an empty answer and dial IPv4 only.
    pub no_aaaa: bool,
    pub mode: QueryMode,
    /// Plaintext resolver for the endpoint host, as `ip` or `ip:port`.
    pub dns_resolver: Option<String>,
    /// IP-echo endpoints for the auto subnet.
    pub probe_urls: Vec<String>,
}

impl Default for DohProviderOptions {
    fn default() -> Self {
        Self {
            endpoint_ips: Vec::new(),
            edns_subnet: "no".to_string(),
            headers: Vec::new(),
            query_params: Vec::new(),
            http2: false,
            ca_cert_path: None,
            no_aaaa: false,
            mode: QueryMode::Wire,
            dns_resolver: None,
            probe_urls: subnet::DEFAULT_PROBE_URLS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

pub struct DohProvider {
    endpoint: Url,
    opts: DohProviderOptions,
    client: reqwest::Client,
    subnet_probe: ExternalSubnetProbe,
}

impl DohProvider {
    pub fn new(endpoint: &str, opts: DohProviderOptions) -> Result<Self, DomainError> {
        let endpoint_url: Url = endpoint
            .parse()
            .map_err(|e| DomainError::InvalidDomainName(format!("endpoint url: {e}")))?;
        endpoint_url
            .host_str()
            .ok_or_else(|| DomainError::InvalidDomainName("endpoint url has no host".to_string()))?;

        let bootstrap = match &opts.dns_resolver {
            Some(resolver) => Some(Arc::new(BootstrapResolver::new(resolver)?)),
            None => None,
        };

        let client = {
            let mut builder = base_builder(&opts)?;
            if !opts.headers.is_empty() {
                builder = builder.default_headers(header_map(&opts.headers)?);
            }
            if !opts.endpoint_ips.is_empty() || bootstrap.is_some() {
                builder = builder.dns_resolver(Arc::new(EndpointAddressResolver::new(
                    opts.endpoint_ips.clone(),
                    bootstrap.clone(),
                    opts.no_aaaa,
                )));
            }
            builder
                .build()
                .map_err(|e| DomainError::UpstreamTransport(format!("config http client error: {e}")))?
        };

        // The probe client resolves its own hosts through the operator's
        // resolver too, falling back to a public one.
        let probe_bootstrap = match bootstrap {
            Some(bootstrap) => bootstrap,
            None => Arc::new(BootstrapResolver::new(PROBE_FALLBACK_RESOLVER)?),
        };
        let probe_client = base_builder(&opts)?
            .dns_resolver(Arc::new(EndpointAddressResolver::new(
                Vec::new(),
                Some(probe_bootstrap),
                opts.no_aaaa,
            )))
            .build()
            .map_err(|e| DomainError::UpstreamTransport(format!("config probe client error: {e}")))?;
        let subnet_probe = ExternalSubnetProbe::new(probe_client, opts.probe_urls.clone());

        Ok(Self {
            endpoint: endpoint_url,
            opts,
            client,
            subnet_probe,
        })
    }

    /// Resolves the configured subnet policy to a CIDR string; empty means
    /// "send none".
    async fn effective_subnet(&self) -> String {
        match self.opts.edns_subnet.as_str() {
            "no" | "" => String::new(),
            "auto" => self.subnet_probe.current().await,
            explicit => match ClientSubnet::from_cidr(explicit) {
                Ok(_) => explicit.to_string(),
                Err(_) => {
                    warn!(subnet = %explicit, "specified subnet is not a valid CIDR");
                    String::new()
                }
            },
        }
    }

    async fn query_wire(&self, query: &Message) -> Result<Message, DomainError> {
        let mut outbound = query.clone();
        let subnet = self.effective_subnet().await;
        if !subnet.is_empty() {
            match ClientSubnet::from_cidr(&subnet) {
                Ok(subnet) => set_client_subnet(&mut outbound, &subnet),
                Err(_) => debug!(subnet = %subnet, "subnet skipped for wire request"),
            }
        }

        let packed = request::pack_padded(&mut outbound)?;
        let url = request::wire_url(&self.endpoint, &packed);
        let http_request = self
            .client
            .get(url)
            .header(ACCEPT, DNS_MESSAGE_CONTENT_TYPE)
            .build()
            .map_err(|e| DomainError::UpstreamTransport(e.to_string()))?;

        let body = http::fetch(&self.client, http_request).await?;
        let mut response = Message::from_vec(&body)
            .map_err(|e| DomainError::InvalidDnsResponse(format!("unpack dns-message: {e}")))?;
        stamp_reply(&mut response, query);
        Ok(response)
    }

    async fn query_resolve(&self, query: &Message) -> Result<Message, DomainError> {
        let question = &query.queries()[0];
        let subnet = self.effective_subnet().await;
        let url = request::parameterized_url(
            &self.endpoint,
            &question.name().to_utf8(),
            question.query_type(),
            &subnet,
            &self.opts.query_params,
            true,
        )?;
        let http_request = self
            .client
            .get(url)
            .build()
            .map_err(|e| DomainError::UpstreamTransport(e.to_string()))?;

        let body = http::fetch(&self.client, http_request).await?;
        // the resolve endpoint answers with a zero identifier
        let mut response = Message::from_vec(&body)
            .map_err(|e| DomainError::InvalidDnsResponse(format!("unpack dns-message: {e}")))?;
        stamp_reply(&mut response, query);
        Ok(response)
    }

    async fn query_json(&self, query: &Message) -> Result<Message, DomainError> {
        let question = &query.queries()[0];
        let subnet = self.effective_subnet().await;
        let url = request::parameterized_url(
            &self.endpoint,
            &question.name().to_utf8(),
            question.query_type(),
            &subnet,
            &self.opts.query_params,
            false,
        )?;
        let http_request = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .build()
            .map_err(|e| DomainError::UpstreamTransport(e.to_string()))?;

        let body = http::fetch(&self.client, http_request).await?;
        let decoded: json::JsonDnsResponse = serde_json::from_slice(&body)
            .map_err(|e| DomainError::InvalidDnsResponse(format!("json decoding error: {e}")))?;
        Ok(json::message_from_json(&decoded, query))
    }
}

#[async_trait]
impl DnsProvider for DohProvider {
    async fn query(&self, message: &Message) -> Result<Message, DomainError> {
        if message.queries().is_empty() {
            return Err(DomainError::InvalidDomainName(
                "should have question in resolve request".to_string(),
            ));
        }

        if self.opts.no_aaaa
            && message
                .queries()
                .iter()
                .any(|q| q.query_type() == RecordType::AAAA)
        {
            debug!("AAAA suppressed, answering with an empty reply");
            return Ok(reply_to(message));
        }

        match self.opts.mode {
            QueryMode::Wire => self.query_wire(message).await,
            QueryMode::Resolve => self.query_resolve(message).await,
            QueryMode::Json => self.query_json(message).await,
        }
    }

    fn source_name(&self) -> &'static str {
        "doh"
    }
}

fn base_builder(opts: &DohProviderOptions) -> Result<reqwest::ClientBuilder, DomainError> {
    let mut builder = reqwest::Client::builder()
        .use_rustls_tls()
        .timeout(REQUEST_TIMEOUT)
        .pool_idle_timeout(KEEP_ALIVE)
        .tcp_keepalive(KEEP_ALIVE)
        .redirect(reqwest::redirect::Policy::none());

    if !opts.http2 {
        builder = builder.http1_only();
    }

    if let Some(path) = &opts.ca_cert_path {
        if path.exists() {
            let pem = std::fs::read(path).map_err(|e| {
                DomainError::IoError(format!("read custom CA certificate failed: {e}"))
            })?;
            let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                DomainError::ConfigError(format!("invalid CA certificate: {e}"))
            })?;
            builder = builder.add_root_certificate(cert);
        }
    }

    Ok(builder)
}

fn header_map(headers: &[(String, String)]) -> Result<HeaderMap, DomainError> {
    let mut map = HeaderMap::new();
    for (key, value) in headers {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| DomainError::ConfigError(format!("invalid header name {key}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| DomainError::ConfigError(format!("invalid header value for {key}: {e}")))?;
        map.append(name, value);
    }
    Ok(map)
}

//! Address resolution for the HTTPS client.
//!
//! The client never resolves the endpoint host through the OS: operator
//! supplied endpoint IPs are dialed directly, otherwise the bootstrap
//! resolver provides addresses. Only address selection is overridden, so
//! TLS keeps verifying the URL host name.

use crate::dns::bootstrap::BootstrapResolver;
use doh_proxy_domain::DomainError;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing::debug;

pub(crate) struct EndpointAddressResolver {
    endpoint_ips: Vec<IpAddr>,
    bootstrap: Option<Arc<BootstrapResolver>>,
    no_aaaa: bool,
}

impl EndpointAddressResolver {
    pub(crate) fn new(
        endpoint_ips: Vec<IpAddr>,
        bootstrap: Option<Arc<BootstrapResolver>>,
        no_aaaa: bool,
    ) -> Self {
        Self {
            endpoint_ips,
            bootstrap,
            no_aaaa,
        }
    }

    async fn pick(&self, host: &str) -> Result<IpAddr, DomainError> {
        if !self.endpoint_ips.is_empty() {
            let ip = self.endpoint_ips[fastrand::usize(..self.endpoint_ips.len())];
            debug!(host = %host, ip = %ip, "endpoint address from configuration");
            return Ok(ip);
        }

        let Some(bootstrap) = &self.bootstrap else {
            return Err(DomainError::EndpointUnresolved(host.to_string()));
        };
        let (ip4s, ip6s) = bootstrap.resolve(host).await;

        if self.no_aaaa {
            if ip4s.is_empty() {
                return Err(DomainError::EndpointUnresolved(host.to_string()));
            }
            return Ok(IpAddr::V4(ip4s[fastrand::usize(..ip4s.len())]));
        }

        let total = ip4s.len() + ip6s.len();
        if total == 0 {
            return Err(DomainError::EndpointUnresolved(host.to_string()));
        }
        let pick = fastrand::usize(..total);
        let ip = if pick < ip4s.len() {
            IpAddr::V4(ip4s[pick])
        } else {
            IpAddr::V6(ip6s[pick - ip4s.len()])
        };
        debug!(host = %host, ip = %ip, "endpoint address from dns resolver");
        Ok(ip)
    }
}

impl Resolve for EndpointAddressResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let endpoint_ips = self.endpoint_ips.clone();
        let bootstrap = self.bootstrap.clone();
        let no_aaaa = self.no_aaaa;
        Box::pin(async move {
            let resolver = EndpointAddressResolver::new(endpoint_ips, bootstrap, no_aaaa);
            let ip = resolver.pick(name.as_str()).await?;
            // the connecting code replaces the port with the URL's
            let addrs: Addrs = Box::new(std::iter::once(SocketAddr::new(ip, 0)));
            Ok(addrs)
        })
    }
}

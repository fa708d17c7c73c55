use doh_proxy_application::ports::{DnsProvider, QueryCache};
use doh_proxy_application::HandleDnsQueryUseCase;
use doh_proxy_domain::config::{parse_key_values, Config};
use doh_proxy_infrastructure::dns::cache::expiry;
use doh_proxy_infrastructure::dns::doh::{DohProvider, DohProviderOptions};
use doh_proxy_infrastructure::dns::{DnsServerHandler, HostsFileProvider, ResponseCache};
use std::sync::Arc;

/// Builds the request pipeline from configuration.
pub fn build_handler(config: &Config) -> anyhow::Result<Arc<DnsServerHandler>> {
    let upstream = &config.upstream;
    let options = DohProviderOptions {
        endpoint_ips: upstream.endpoint_ips.clone(),
        edns_subnet: upstream.edns_subnet.clone(),
        headers: parse_key_values(&upstream.headers)?,
        query_params: parse_key_values(&upstream.params)?,
        http2: upstream.http2,
        ca_cert_path: upstream.cacert.clone().map(Into::into),
        no_aaaa: upstream.no_aaaa,
        mode: upstream.mode,
        dns_resolver: upstream.dns_resolver.clone(),
        ..DohProviderOptions::default()
    };

    let provider: Arc<dyn DnsProvider> =
        Arc::new(DohProvider::new(&upstream.endpoint, options)?);
    let hosts: Arc<dyn DnsProvider> = Arc::new(HostsFileProvider::new());

    let cache: Option<Arc<dyn QueryCache>> = if config.cache.enabled {
        let cache = Arc::new(ResponseCache::new());
        expiry::spawn(Arc::clone(&cache));
        Some(cache)
    } else {
        None
    };

    let use_case = Arc::new(HandleDnsQueryUseCase::new(
        provider,
        hosts,
        cache,
        upstream.no_aaaa,
    ));
    Ok(Arc::new(DnsServerHandler::new(use_case)))
}

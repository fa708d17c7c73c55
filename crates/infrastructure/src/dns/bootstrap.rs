//! Resolves the DoH endpoint host through an operator-chosen plaintext
//! resolver, memoizing the result per host.
//!
//! A and AAAA are queried over both UDP and TCP and all successful answers
//! are collected. The memo holds for 60 seconds; callers always see the
//! last-good snapshot while a stale entry refreshes in the background. An
//! empty result re-arms expiry one second out so retries happen quickly.

use crate::dns::clock::unix_now;
use crate::dns::transport::{tcp::TcpTransport, udp::UdpTransport, DnsTransport};
use dashmap::DashMap;
use doh_proxy_domain::message::name::canonical_name;
use doh_proxy_domain::DomainError;
use hickory_proto::op::{Message, Query};
use hickory_proto::rr::{Name, RData, RecordType};
use parking_lot::Mutex;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

const HOST_TTL_SECS: i64 = 60;
const EMPTY_RETRY_SECS: i64 = 1;
const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Default)]
struct HostAddrs {
    ip4s: Vec<Ipv4Addr>,
    ip6s: Vec<Ipv6Addr>,
    expire_at: i64,
}

#[derive(Default)]
struct HostEntry {
    state: Mutex<HostAddrs>,
    refreshing: AtomicBool,
}

pub struct BootstrapResolver {
    resolver_addr: SocketAddr,
    hosts: DashMap<String, Arc<HostEntry>>,
}

impl BootstrapResolver {
    /// Accepts `ip` or `ip:port`; a bare IP gets the standard port 53.
    pub fn new(resolver: &str) -> Result<Self, DomainError> {
        let resolver_addr = if let Ok(ip) = resolver.parse::<IpAddr>() {
            SocketAddr::new(ip, 53)
        } else {
            resolver
                .parse()
                .map_err(|_| DomainError::InvalidIpAddress(resolver.to_string()))?
        };
        Ok(Self {
            resolver_addr,
            hosts: DashMap::new(),
        })
    }

    pub fn resolver_addr(&self) -> SocketAddr {
        self.resolver_addr
    }

    /// Snapshot of the host's addresses. The first call resolves
    /// synchronously; stale entries refresh in a background task while the
    /// caller keeps the previous result.
    pub async fn resolve(self: &Arc<Self>, host: &str) -> (Vec<Ipv4Addr>, Vec<Ipv6Addr>) {
        let key = canonical_name(host);
        let entry = self
            .hosts
            .entry(key.clone())
            .or_insert_with(|| Arc::new(HostEntry::default()))
            .clone();

        let snapshot = entry.state.lock().clone();
        let now = unix_now();

        if snapshot.ip4s.is_empty() && snapshot.ip6s.is_empty() {
            debug!(host = %key, "no cached endpoint address, resolving");
            let addrs = self.lookup(&key).await;
            let mut state = entry.state.lock();
            *state = addrs;
            return (state.ip4s.clone(), state.ip6s.clone());
        }

        if now > snapshot.expire_at && !entry.refreshing.swap(true, Ordering::AcqRel) {
            let resolver = Arc::clone(self);
            let entry = Arc::clone(&entry);
            tokio::spawn(async move {
                let addrs = resolver.lookup(&key).await;
                *entry.state.lock() = addrs;
                entry.refreshing.store(false, Ordering::Release);
            });
        }

        (snapshot.ip4s, snapshot.ip6s)
    }

    async fn lookup(&self, host: &str) -> HostAddrs {
        let mut addrs = HostAddrs::default();

        let Ok(name) = Name::from_str(host) else {
            error!(host = %host, "endpoint host is not a valid DNS name");
            return addrs;
        };

        let udp = UdpTransport::new(self.resolver_addr);
        let tcp = TcpTransport::new(self.resolver_addr);
        let transports: [&dyn DnsTransport; 2] = [&udp, &tcp];

        for transport in transports {
            for rtype in [RecordType::A, RecordType::AAAA] {
                match self.exchange(transport, &name, rtype).await {
                    Ok(reply) => {
                        for record in reply.answers() {
                            match record.data() {
                                Some(RData::A(a)) => addrs.ip4s.push(a.0),
                                Some(RData::AAAA(aaaa)) => addrs.ip6s.push(aaaa.0),
                                _ => {}
                            }
                        }
                    }
                    Err(e) => {
                        error!(
                            host = %host,
                            transport = transport.protocol_name(),
                            error = %e,
                            "can't resolve endpoint host with provided dns resolver"
                        );
                    }
                }
            }
        }

        addrs.expire_at = if addrs.ip4s.is_empty() && addrs.ip6s.is_empty() {
            unix_now() + EMPTY_RETRY_SECS
        } else {
            unix_now() + HOST_TTL_SECS
        };
        debug!(
            host = %host,
            ip4s = addrs.ip4s.len(),
            ip6s = addrs.ip6s.len(),
            "endpoint host resolved"
        );
        addrs
    }

    async fn exchange(
        &self,
        transport: &dyn DnsTransport,
        name: &Name,
        rtype: RecordType,
    ) -> Result<Message, DomainError> {
        let mut msg = Message::new();
        msg.set_id(fastrand::u16(..));
        msg.set_recursion_desired(true);
        let mut query = Query::new();
        query.set_name(name.clone());
        query.set_query_type(rtype);
        msg.add_query(query);

        let packed = msg
            .to_vec()
            .map_err(|e| DomainError::MessageEncode(e.to_string()))?;
        let response = transport.send(&packed, EXCHANGE_TIMEOUT).await?;
        Message::from_vec(&response.bytes)
            .map_err(|e| DomainError::InvalidDnsResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_ip_gets_default_port() {
        let resolver = BootstrapResolver::new("8.8.8.8").unwrap();
        assert_eq!(resolver.resolver_addr().to_string(), "8.8.8.8:53");
    }

    #[test]
    fn explicit_port_is_kept() {
        let resolver = BootstrapResolver::new("8.8.8.8:5353").unwrap();
        assert_eq!(resolver.resolver_addr().port(), 5353);

        let resolver = BootstrapResolver::new("[2001:4860:4860::8888]:53").unwrap();
        assert!(resolver.resolver_addr().is_ipv6());
    }

    #[test]
    fn unrecognizable_resolver_is_rejected() {
        assert!(BootstrapResolver::new("definitely not an address").is_err());
    }
}

use doh_proxy_domain::config::{StubConfig, StubProtocol};
use doh_proxy_domain::DomainError;
use doh_proxy_infrastructure::dns::transport::{
    tcp::TcpTransport, udp::UdpTransport, DnsTransport,
};
use hickory_proto::op::Message;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Round-robin relay to the configured classical upstreams, retrying a
/// failed exchange once on the next address.
pub struct UpstreamRelay {
    addrs: Vec<SocketAddr>,
    protocol: StubProtocol,
    next: AtomicUsize,
}

impl UpstreamRelay {
    pub fn from_config(config: &StubConfig) -> Result<Self, DomainError> {
        let mut addrs = Vec::new();
        for item in config.upstream.split(',') {
            if item.is_empty() {
                continue;
            }
            if let Ok(addr) = item.parse::<SocketAddr>() {
                addrs.push(addr);
            } else if let Ok(ip) = item.parse::<IpAddr>() {
                addrs.push(SocketAddr::new(ip, 53));
            } else {
                warn!(upstream = %item, "skipping unparseable upstream address");
            }
        }
        if addrs.is_empty() {
            return Err(DomainError::ConfigError(
                "no valid upstream address for the stub".to_string(),
            ));
        }
        info!(upstreams = addrs.len(), protocol = ?config.protocol, "stub relay configured");
        Ok(Self {
            addrs,
            protocol: config.protocol,
            next: AtomicUsize::new(0),
        })
    }

    pub fn upstreams(&self) -> &[SocketAddr] {
        &self.addrs
    }

    /// Exchanges a message with the next upstream; a failure is retried
    /// once against the following address.
    pub async fn exchange(&self, msg: &Message) -> Result<Message, DomainError> {
        let packed = msg
            .to_vec()
            .map_err(|e| DomainError::MessageEncode(e.to_string()))?;

        let mut last_error = None;
        for attempt in 0..2 {
            let addr = self.turn();
            match self.send_to(addr, &packed).await {
                Ok(reply) => {
                    debug!(upstream = %addr, attempt, "relay exchange succeeded");
                    return Ok(reply);
                }
                Err(e) => {
                    warn!(upstream = %addr, attempt, error = %e, "relay exchange failed");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| {
            DomainError::UpstreamTransport("no upstream attempt was made".to_string())
        }))
    }

    fn turn(&self) -> SocketAddr {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.addrs.len();
        self.addrs[idx]
    }

    async fn send_to(&self, addr: SocketAddr, packed: &[u8]) -> Result<Message, DomainError> {
        let response = match self.protocol {
            StubProtocol::Udp => {
                UdpTransport::new(addr)
                    .send(packed, EXCHANGE_TIMEOUT)
                    .await?
            }
            StubProtocol::Tcp => {
                TcpTransport::new(addr)
                    .send(packed, EXCHANGE_TIMEOUT)
                    .await?
            }
        };
        Message::from_vec(&response.bytes)
            .map_err(|e| DomainError::InvalidDnsResponse(e.to_string()))
    }
}

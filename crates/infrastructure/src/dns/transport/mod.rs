pub mod tcp;
pub mod udp;

use async_trait::async_trait;
use doh_proxy_domain::DomainError;
use std::time::Duration;

#[derive(Debug)]
pub struct TransportResponse {
    pub bytes: Vec<u8>,
    pub protocol_used: &'static str,
}

/// Classical DNS exchange against a plaintext resolver, used to bootstrap
/// the DoH endpoint address and by the stub relay.
#[async_trait]
pub trait DnsTransport: Send + Sync {
    async fn send(
        &self,
        message_bytes: &[u8],
        timeout: Duration,
    ) -> Result<TransportResponse, DomainError>;

    fn protocol_name(&self) -> &'static str;
}

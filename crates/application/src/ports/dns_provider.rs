use async_trait::async_trait;
use doh_proxy_domain::DomainError;
use hickory_proto::op::Message;

/// A source of DNS answers: the hosts file, or the DoH upstream.
///
/// `query` consumes a decoded question message and produces a full reply
/// message whose identifier matches the query.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    async fn query(&self, message: &Message) -> Result<Message, DomainError>;

    fn source_name(&self) -> &'static str;
}

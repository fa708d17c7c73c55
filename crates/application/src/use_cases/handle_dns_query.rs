use super::admission::AdmissionGate;
use super::pool::{UpstreamPool, DEFAULT_POOL_SIZE};
use crate::ports::{DnsProvider, QueryCache};
use doh_proxy_domain::message::edns;
use doh_proxy_domain::DomainError;
use hickory_proto::op::Message;
use hickory_proto::rr::RecordType;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Orchestrates one inbound query: response cache, then hosts file (for
/// address questions), then the DoH upstream behind the admission gate.
/// Produces exactly one outcome per query: a reply message, or an error
/// the front-end turns into a server failure.
pub struct HandleDnsQueryUseCase {
    cache: Option<Arc<dyn QueryCache>>,
    hosts: Arc<dyn DnsProvider>,
    pool: UpstreamPool,
    gate: AdmissionGate,
    no_aaaa: bool,
}

impl HandleDnsQueryUseCase {
    pub fn new(
        upstream: Arc<dyn DnsProvider>,
        hosts: Arc<dyn DnsProvider>,
        cache: Option<Arc<dyn QueryCache>>,
        no_aaaa: bool,
    ) -> Self {
        Self {
            cache,
            hosts,
            pool: UpstreamPool::new(upstream, DEFAULT_POOL_SIZE),
            gate: AdmissionGate::new(),
            no_aaaa,
        }
    }

    pub fn with_pool_size(mut self, upstream: Arc<dyn DnsProvider>, size: usize) -> Self {
        self.pool = UpstreamPool::new(upstream, size);
        self
    }

    pub async fn execute(&self, query: &Message) -> Result<Message, DomainError> {
        let question = query
            .queries()
            .first()
            .ok_or_else(|| DomainError::InvalidDomainName("no question in query".to_string()))?;
        let qname = question.name().to_utf8();
        let qtype = question.query_type();
        let received = Instant::now();

        info!(name = %qname, rtype = %qtype, "requesting");

        // The upstream may answer with the subnet it used; the client gets
        // back exactly what it sent.
        let original_subnet = edns::client_subnet(query);

        if let Some(cache) = &self.cache {
            if let Some(mut reply) = cache.get(query) {
                edns::restore_client_subnet(&mut reply, original_subnet.as_ref());
                info!(name = %qname, elapsed = ?received.elapsed(), "resolved from cache");
                return Ok(reply);
            }
        }

        if matches!(qtype, RecordType::A | RecordType::AAAA) {
            match self.hosts.query(query).await {
                Ok(mut reply) => {
                    edns::restore_client_subnet(&mut reply, original_subnet.as_ref());
                    info!(name = %qname, elapsed = ?received.elapsed(), "resolved from hosts");
                    return Ok(reply);
                }
                Err(e) => {
                    debug!(name = %qname, error = %e, "hosts file provider missed");
                }
            }
        }

        self.gate.admit().await?;

        match self.pool.dispatch(query.clone()).await {
            Ok(mut reply) => {
                let suppressed = self.no_aaaa && qtype == RecordType::AAAA;
                edns::restore_client_subnet(&mut reply, original_subnet.as_ref());
                if !suppressed {
                    if let Some(cache) = &self.cache {
                        cache.insert(&reply);
                    }
                }
                if self.gate.is_serial() {
                    if suppressed {
                        self.gate.release().await;
                    } else {
                        self.gate.leave_serial().await;
                    }
                }
                info!(name = %qname, elapsed = ?received.elapsed(), "resolved from DoH");
                Ok(reply)
            }
            Err(e) => {
                error!(name = %qname, error = %e, "upstream query failed");
                self.gate.enter_serial().await;
                Err(e)
            }
        }
    }
}

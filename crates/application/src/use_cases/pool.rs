use crate::ports::DnsProvider;
use doh_proxy_domain::DomainError;
use hickory_proto::op::Message;
use std::sync::Arc;
use tokio::sync::{oneshot, Semaphore};
use tracing::{debug, error};

/// Upstream concurrency cap.
pub const DEFAULT_POOL_SIZE: usize = 128;

/// Bounded pool of upstream dispatches, the only route into the DoH
/// provider. A saturated pool rejects callers immediately instead of
/// queueing them.
pub struct UpstreamPool {
    provider: Arc<dyn DnsProvider>,
    permits: Arc<Semaphore>,
}

impl UpstreamPool {
    pub fn new(provider: Arc<dyn DnsProvider>, size: usize) -> Self {
        Self {
            provider,
            permits: Arc::new(Semaphore::new(size)),
        }
    }

    /// Hands the query to a worker and awaits its single reply.
    pub async fn dispatch(&self, query: Message) -> Result<Message, DomainError> {
        let permit = match Arc::clone(&self.permits).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                error!("upstream worker pool saturated");
                return Err(DomainError::PoolSaturated);
            }
        };

        let provider = Arc::clone(&self.provider);
        let (reply_tx, reply_rx) = oneshot::channel();
        tokio::spawn(async move {
            let result = provider.query(&query).await;
            drop(permit);
            if reply_tx.send(result).is_err() {
                debug!("upstream reply receiver dropped");
            }
        });

        reply_rx
            .await
            .map_err(|_| DomainError::UpstreamTransport("upstream worker vanished".to_string()))?
    }
}

use crate::relay::UpstreamRelay;
use doh_proxy_infrastructure::dns::ResponseCache;
use std::sync::Arc;

#[derive(Clone)]
pub struct StubState {
    pub relay: Arc<UpstreamRelay>,
    pub cache: Option<Arc<ResponseCache>>,
}

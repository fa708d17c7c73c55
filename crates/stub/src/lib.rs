//! HTTP stub front: a `GET /resolve` endpoint that synthesizes DNS
//! queries from URL parameters and relays them to a classical upstream.

mod handlers;
mod relay;
mod routes;
mod state;
mod subnet_policy;

pub use relay::UpstreamRelay;
pub use routes::create_stub_routes;
pub use state::StubState;

use doh_proxy_domain::config::StubConfig;
use doh_proxy_domain::DomainError;
use doh_proxy_infrastructure::dns::cache::expiry;
use doh_proxy_infrastructure::dns::ResponseCache;
use std::sync::Arc;
use tracing::info;

/// Builds the stub state from configuration and serves it until the
/// listener fails.
pub async fn serve(config: &StubConfig) -> Result<(), DomainError> {
    let relay = Arc::new(UpstreamRelay::from_config(config)?);
    let cache = if config.cache {
        let cache = Arc::new(ResponseCache::new());
        expiry::spawn(Arc::clone(&cache));
        Some(cache)
    } else {
        None
    };

    let state = StubState { relay, cache };
    let app = create_stub_routes(state);

    let listener = tokio::net::TcpListener::bind(&config.listen)
        .await
        .map_err(|e| DomainError::IoError(format!("stub bind {}: {}", config.listen, e)))?;

    info!(listen = %config.listen, "stub server running");
    axum::serve(listener, app)
        .await
        .map_err(|e| DomainError::IoError(format!("stub server: {e}")))
}

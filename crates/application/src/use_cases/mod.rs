mod admission;
mod handle_dns_query;
mod pool;

pub use admission::AdmissionGate;
pub use handle_dns_query::HandleDnsQueryUseCase;
pub use pool::UpstreamPool;

mod cache;
mod errors;
mod logging;
mod root;
mod server;
mod stub;
mod upstream;

pub use cache::CacheConfig;
pub use errors::ConfigError;
pub use logging::LoggingConfig;
pub use root::{CliOverrides, Config};
pub use server::ServerConfig;
pub use stub::{StubConfig, StubProtocol};
pub use upstream::{parse_ip_csv, parse_key_values, QueryMode, UpstreamConfig};

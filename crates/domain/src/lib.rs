pub mod config;
pub mod errors;
pub mod message;

pub use config::{
    CacheConfig, CliOverrides, Config, ConfigError, LoggingConfig, QueryMode, ServerConfig,
    StubConfig, UpstreamConfig,
};
pub use errors::DomainError;

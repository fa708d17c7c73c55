use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum DomainError {
    #[error("Invalid domain name: {0}")]
    InvalidDomainName(String),

    #[error("Name length of {0} exceeds DNS name max length")]
    NameTooLong(usize),

    #[error("Invalid IP address: {0}")]
    InvalidIpAddress(String),

    #[error("Invalid CIDR format: {0}")]
    InvalidCidr(String),

    #[error("Invalid DNS response: {0}")]
    InvalidDnsResponse(String),

    #[error("Failed to encode DNS message: {0}")]
    MessageEncode(String),

    #[error("Failed to decode cached message: {0}")]
    CacheDecode(String),

    #[error("Hosts file answers only A and AAAA questions")]
    HostsUnsupportedType,

    #[error("Address family does not match question type")]
    HostsFamilyMismatch,

    #[error("No answer from hosts file")]
    HostsMiss,

    #[error("Upstream returned HTTP {status}: {reason}")]
    UpstreamHttp { status: u16, reason: String },

    #[error("Upstream transport error: {0}")]
    UpstreamTransport(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Transport timeout connecting to {server}")]
    TransportTimeout { server: String },

    #[error("No address available for dialing {0}")]
    EndpointUnresolved(String),

    #[error("Could not obtain external IP address")]
    ExternalIpUnavailable,

    #[error("Timeout waiting for upstream admission")]
    GateTimeout,

    #[error("Upstream worker pool is saturated")]
    PoolSaturated,

    #[error("Query timeout")]
    QueryTimeout,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    IoError(String),
}

use serde::{Deserialize, Serialize};

/// Transport used by the stub front towards its classical upstream.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StubProtocol {
    #[default]
    Udp,
    Tcp,
}

/// Optional HTTP front that relays `/resolve` requests to a classical
/// DNS upstream.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StubConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_listen")]
    pub listen: String,

    /// Comma-separated upstream addresses as `ip` or `ip:port`.
    #[serde(default)]
    pub upstream: String,

    #[serde(default)]
    pub protocol: StubProtocol,

    #[serde(default)]
    pub cache: bool,
}

impl Default for StubConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: default_listen(),
            upstream: String::new(),
            protocol: StubProtocol::default(),
            cache: false,
        }
    }
}

fn default_listen() -> String {
    "127.0.0.1:8053".to_string()
}

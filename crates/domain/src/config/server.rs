use super::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Listener configuration for the classical DNS front-end.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Listen address as `[host]:port`; an empty host binds all interfaces.
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_true")]
    pub udp: bool,

    #[serde(default = "default_true")]
    pub tcp: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            udp: true,
            tcp: true,
        }
    }
}

impl ServerConfig {
    /// Resolves the `[host]:port` form, defaulting an empty host to `0.0.0.0`.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = self.listen.trim();
        let candidate = if let Some(port) = raw.strip_prefix(':') {
            format!("0.0.0.0:{port}")
        } else {
            raw.to_string()
        };
        candidate
            .parse()
            .map_err(|_| ConfigError::InvalidListen(self.listen.clone()))
    }
}

fn default_listen() -> String {
    ":53".to_string()
}

fn default_true() -> bool {
    true
}

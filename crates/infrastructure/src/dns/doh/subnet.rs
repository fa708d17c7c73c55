//! External-IP discovery for `edns-subnet = "auto"`.
//!
//! Public IP-echo endpoints are tried in order until one returns a JSON
//! body with an `ip` or `address` field. The derived subnet (`/32` for
//! IPv4, `/64` for IPv6) is cached for 15 minutes; once a value exists,
//! refreshes run in the background and the caller never waits or fails.

use crate::dns::clock::unix_now;
use parking_lot::Mutex;
use serde::Deserialize;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

const REFRESH_WINDOW_SECS: i64 = 15 * 60;
const PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// IP-echo endpoints tried in order.
pub const DEFAULT_PROBE_URLS: &[&str] = &[
    "https://wq.apnic.net/ip",
    "https://accountws.arin.net/public/seam/resource/rest/myip",
    "https://rdap.lacnic.net/rdap/info/myip",
    "https://api.myip.la/en?json",
    "https://api.ip.sb/jsonip",
];

#[derive(Debug, Deserialize)]
struct IpEchoBody {
    #[serde(default)]
    ip: String,
    #[serde(default)]
    address: String,
}

#[derive(Default)]
struct SubnetState {
    subnet: String,
    expire_at: i64,
    updating: bool,
}

#[derive(Clone)]
pub struct ExternalSubnetProbe {
    client: reqwest::Client,
    urls: Arc<Vec<String>>,
    state: Arc<Mutex<SubnetState>>,
}

impl ExternalSubnetProbe {
    pub fn new(client: reqwest::Client, urls: Vec<String>) -> Self {
        Self {
            client,
            urls: Arc::new(urls),
            state: Arc::new(Mutex::new(SubnetState::default())),
        }
    }

    /// The current external subnet in CIDR form, or an empty string when
    /// it was never obtained. Fresh values are served from cache; a stale
    /// value triggers a background renewal; only the very first call
    /// resolves synchronously.
    pub async fn current(&self) -> String {
        let now = unix_now();
        enum Plan {
            Cached(String),
            CachedWithRefresh(String),
            Synchronous,
        }

        let plan = {
            let mut state = self.state.lock();
            if now < state.expire_at {
                Plan::Cached(state.subnet.clone())
            } else if !state.subnet.is_empty() {
                if state.updating {
                    Plan::Cached(state.subnet.clone())
                } else {
                    state.updating = true;
                    Plan::CachedWithRefresh(state.subnet.clone())
                }
            } else if state.updating {
                Plan::Cached(String::new())
            } else {
                state.updating = true;
                Plan::Synchronous
            }
        };

        match plan {
            Plan::Cached(subnet) => subnet,
            Plan::CachedWithRefresh(subnet) => {
                let probe = self.clone();
                tokio::spawn(async move { probe.renew().await });
                subnet
            }
            Plan::Synchronous => {
                self.renew().await;
                self.state.lock().subnet.clone()
            }
        }
    }

    async fn renew(&self) {
        debug!("start obtaining external ip");
        let discovered = self.obtain_external_ip().await;

        let mut state = self.state.lock();
        if let Some(ip) = discovered {
            state.subnet = match ip {
                IpAddr::V4(_) => format!("{ip}/32"),
                IpAddr::V6(_) => format!("{ip}/64"),
            };
            info!(subnet = %state.subnet, "renewed external subnet");
        }
        state.expire_at = unix_now() + REFRESH_WINDOW_SECS;
        state.updating = false;
    }

    async fn obtain_external_ip(&self) -> Option<IpAddr> {
        for url in self.urls.iter() {
            debug!(url = %url, "probing external ip");
            let response = match self
                .client
                .get(url)
                .timeout(PROBE_TIMEOUT)
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    error!(url = %url, error = %e, "ip echo request failed");
                    continue;
                }
            };

            let body: IpEchoBody = match response.json().await {
                Ok(body) => body,
                Err(e) => {
                    error!(url = %url, error = %e, "ip echo body unreadable");
                    continue;
                }
            };

            let raw = if !body.ip.is_empty() {
                body.ip
            } else if !body.address.is_empty() {
                body.address
            } else {
                continue;
            };

            match raw.trim().parse::<IpAddr>() {
                Ok(ip) => {
                    info!(ip = %ip, url = %url, "obtained external ip");
                    return Some(ip);
                }
                Err(e) => {
                    error!(url = %url, raw = %raw, error = %e, "ip echo returned garbage");
                }
            }
        }
        error!("can't obtain external ip from any probe endpoint");
        None
    }
}
